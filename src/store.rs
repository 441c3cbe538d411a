//! Key-value cache backend for persisted stats records.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

/// Distributed key-value cache with TTL, shared by all workers.
///
/// A missing key is never an error: it reads as "not yet computed".
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Batch lookup returning present keys only. The principal
    /// N+1-avoidance primitive: one round trip for a whole child set.
    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>>;
}

// ============================================================================
// MemoryCacheStore
// ============================================================================

struct CacheEntry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// In-process cache store for tests and single-process embedders.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Raw bytes of a live entry, for asserting on persisted snapshots.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.bytes.clone())
    }

    fn fetch(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.bytes.clone());
            }
        }
        // Expired entries are dropped on access.
        self.entries
            .remove_if(key, |_, entry| entry.expires_at <= Instant::now());
        None
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.fetch(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                bytes: value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>> {
        let mut found = HashMap::new();
        for key in keys {
            if let Some(bytes) = self.fetch(key) {
                found.insert(key.clone(), bytes);
            }
        }
        Ok(found)
    }
}
