//! Deferred post-commit execution of statistics refreshes.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::engine::StatsEngine;
use crate::error::Result;
use crate::keys::NodeKey;

/// Message enqueued when a leaf save needs its ancestors recomputed.
///
/// Carries only the node key; the worker reconstructs the node, so a stale
/// live reference can never leak into the queue. Delivery is at-least-once
/// and processing is idempotent (full recompute, whole-record overwrite).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshJob {
    pub node: NodeKey,
}

/// Hands refresh jobs to whatever executes deferred work once the
/// triggering unit-of-work has committed.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn schedule_after_commit(&self, job: RefreshJob) -> Result<()>;
}

// ============================================================================
// ChannelScheduler - queue-backed execution
// ============================================================================

/// Scheduler pushing jobs onto an unbounded channel drained by
/// [`refresh_worker`].
pub struct ChannelScheduler {
    tx: mpsc::UnboundedSender<RefreshJob>,
}

impl ChannelScheduler {
    /// Create the scheduler plus the receiving end for a worker loop.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RefreshJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Scheduler for ChannelScheduler {
    async fn schedule_after_commit(&self, job: RefreshJob) -> Result<()> {
        if self.tx.send(job).is_err() {
            warn!("refresh worker gone, dropping refresh job");
        }
        Ok(())
    }
}

/// Worker loop draining refresh jobs against an engine. Failures are logged
/// and dropped; a vanished backing entity is the calling layer's problem.
pub async fn refresh_worker(engine: Arc<StatsEngine>, mut rx: mpsc::UnboundedReceiver<RefreshJob>) {
    while let Some(job) = rx.recv().await {
        if let Err(err) = engine.process_refresh(&job).await {
            warn!(node = %job.node, error = %err, "refresh job failed");
        }
    }
}

// ============================================================================
// CollectingScheduler - synchronous test mode
// ============================================================================

/// Scheduler that records jobs for manual draining, the synchronous analog
/// used by the test suites.
#[derive(Default)]
pub struct CollectingScheduler {
    jobs: parking_lot::Mutex<Vec<RefreshJob>>,
}

impl CollectingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all jobs scheduled so far.
    pub fn drain(&self) -> Vec<RefreshJob> {
        std::mem::take(&mut self.jobs.lock())
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[async_trait]
impl Scheduler for CollectingScheduler {
    async fn schedule_after_commit(&self, job: RefreshJob) -> Result<()> {
        self.jobs.lock().push(job);
        Ok(())
    }
}
