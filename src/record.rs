//! The persisted statistics record and its aggregation rules.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};

// ============================================================================
// MetricValue
// ============================================================================

/// Value of one metric inside a stats record.
///
/// Counts are signed because the derived `waiting_review` family subtracts
/// three independent figures and may legitimately go negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetricValue {
    Count(i64),
    Time(DateTime<Utc>),
    Author(String),
    /// Explicit null for `last_changed`/`last_author` when no change exists.
    Absent,
    /// Derived on read, never persisted.
    Percent(f64),
}

impl MetricValue {
    /// Numeric view; non-numeric values read as 0.
    #[inline]
    pub fn as_count(&self) -> i64 {
        match self {
            MetricValue::Count(n) => *n,
            _ => 0,
        }
    }

    #[inline]
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            MetricValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    #[inline]
    pub fn as_percent(&self) -> f64 {
        match self {
            MetricValue::Percent(p) => *p,
            MetricValue::Count(n) => *n as f64,
            _ => 0.0,
        }
    }
}

// ============================================================================
// StatsRecord
// ============================================================================

/// One node's metric-name to value mapping.
///
/// Either entirely empty (never computed) or complete for the node kind's
/// key set plus `stats_timestamp`. Persisted as an opaque serialized map;
/// persistence is whole-record replacement, never a field-level merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    data: BTreeMap<String, MetricValue>,
}

impl StatsRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// All-zero record over the given key set, with the `last_*` keys absent
    /// and a zero `stats_timestamp`.
    pub fn zero<'a>(keys: impl IntoIterator<Item = &'a String>) -> Self {
        let mut record = Self::new();
        for key in keys {
            if key.starts_with("last_") {
                record.data.insert(key.clone(), MetricValue::Absent);
            } else {
                record.data.insert(key.clone(), MetricValue::Count(0));
            }
        }
        record.data
            .insert("stats_timestamp".to_string(), MetricValue::Count(0));
        record
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&MetricValue> {
        self.data.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricValue)> {
        self.data.iter()
    }

    /// Store a value, coercing a missing aggregate result to zero. The
    /// `last_*` keys keep an explicit null instead.
    pub fn store(&mut self, key: &str, value: Option<MetricValue>) {
        let value = match value {
            Some(value) => value,
            None if key.starts_with("last_") => MetricValue::Absent,
            None => MetricValue::Count(0),
        };
        self.data.insert(key.to_string(), value);
    }

    #[inline]
    pub fn store_count(&mut self, key: &str, value: i64) {
        self.data.insert(key.to_string(), MetricValue::Count(value));
    }

    #[inline]
    pub fn count(&self, name: &str) -> i64 {
        self.data.get(name).map(MetricValue::as_count).unwrap_or(0)
    }

    pub fn stats_timestamp(&self) -> i64 {
        self.count("stats_timestamp")
    }

    pub fn set_stats_timestamp(&mut self, micros: i64) {
        self.store_count("stats_timestamp", micros);
    }

    /// Whether the basic key set has been computed for this record.
    #[inline]
    pub fn has_basic(&self) -> bool {
        self.contains("all")
    }

    /// Copy of the underlying map, for reporting surfaces.
    pub fn to_map(&self) -> BTreeMap<String, MetricValue> {
        self.data.clone()
    }

    // ------------------------------------------------------------------
    // Aggregation
    // ------------------------------------------------------------------

    /// Fold one child record into this one over the given keys.
    ///
    /// Counts are summed; `last_changed`/`last_author` follow the most
    /// recent contributor; `stats_timestamp` takes the maximum contributor
    /// timestamp regardless of the key list.
    pub fn aggregate_from<'a>(
        &mut self,
        child: &StatsRecord,
        keys: impl IntoIterator<Item = &'a String>,
    ) {
        for key in keys {
            match key.as_str() {
                "last_changed" => self.take_most_recent(child),
                // Carried along with last_changed.
                "last_author" => {}
                key => {
                    let sum = self.count(key) + child.count(key);
                    self.store_count(key, sum);
                }
            }
        }
        let timestamp = self.stats_timestamp().max(child.stats_timestamp());
        self.set_stats_timestamp(timestamp);
    }

    fn take_most_recent(&mut self, child: &StatsRecord) {
        let Some(theirs) = child.get("last_changed").and_then(MetricValue::as_time) else {
            return;
        };
        let ours = self.get("last_changed").and_then(MetricValue::as_time);
        if ours.is_none_or(|t| t < theirs) {
            self.data
                .insert("last_changed".to_string(), MetricValue::Time(theirs));
            let author = child
                .get("last_author")
                .cloned()
                .unwrap_or(MetricValue::Absent);
            self.data.insert("last_author".to_string(), author);
        }
    }

    /// Add a translation child's `all*` totals into the `source_*` measures.
    /// Used by language-scoped composites, whose children carry no
    /// `source_*` of their own.
    pub fn add_source_from_all(&mut self, child: &StatsRecord) {
        for (source, all) in [
            ("source_strings", "all"),
            ("source_words", "all_words"),
            ("source_chars", "all_chars"),
        ] {
            let sum = self.count(source) + child.count(all);
            self.store_count(source, sum);
        }
    }

    /// Content view without `stats_timestamp`, for change detection between
    /// two computations of the same node.
    pub fn content_eq(&self, other: &StatsRecord) -> bool {
        let mut ours = self.data.clone();
        ours.remove("stats_timestamp");
        let mut theirs = other.data.clone();
        theirs.remove("stats_timestamp");
        ours == theirs
    }

    // ------------------------------------------------------------------
    // Codec
    // ------------------------------------------------------------------

    pub fn encode(&self, cache_key: &str) -> Result<Vec<u8>> {
        bincode::serialize(&self.data).map_err(|source| StatsError::Encode {
            key: cache_key.to_string(),
            source,
        })
    }

    /// Decode a persisted entry. Undecodable bytes read as "never computed"
    /// rather than an error, matching the cache-miss contract.
    pub fn decode(bytes: &[u8], cache_key: &str) -> Self {
        match bincode::deserialize::<BTreeMap<String, MetricValue>>(bytes) {
            Ok(data) => Self { data },
            Err(err) => {
                tracing::warn!(key = cache_key, error = %err, "discarding undecodable stats record");
                Self::new()
            }
        }
    }
}

/// Percent of `part` in `total`, unclamped. A zero denominator reads as
/// fully complete or fully incomplete depending on `zero_complete`.
pub fn translation_percent(part: f64, total: f64, zero_complete: bool) -> f64 {
    if total == 0.0 {
        if zero_complete { 100.0 } else { 0.0 }
    } else {
        part / total * 100.0
    }
}
