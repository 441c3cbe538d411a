//! Leaf computation: deriving a translation's basic measures from raw
//! content. The only node kind that queries the content source directly.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{NodeStats, StatsEngine};
use crate::error::{Result, StatsError};
use crate::keys::{TranslationId, basic_keys, last_change_key};
use crate::record::{MetricValue, StatsRecord};
use crate::source::{BreakdownRow, ChangeRecord, UnitSnapshot, UnitState};

/// Activity window for `recent_changes`, counted back from `last_changed`.
const RECENT_WINDOW_HOURS: i64 = 6;
/// Activity window for `monthly_changes`, counted back from now.
const MONTHLY_WINDOW_DAYS: i64 = 30;

/// Cached pointer to a leaf's most recent change. The explicit `NoChanges`
/// sentinel keeps "no changes exist" distinct from "not yet checked".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum LastChangePointer {
    NoChanges,
    Change(ChangeRecord),
}

/// One pass over the unit snapshots, filling every partition of the basic
/// key set.
pub(crate) async fn compute_basic(
    engine: &StatsEngine,
    node: &Arc<NodeStats>,
    id: TranslationId,
) -> Result<StatsRecord> {
    let units = engine.source().unit_stats(id).await?;
    let mut record = StatsRecord::zero(basic_keys());

    for unit in &units {
        bump(&mut record, "all", unit);
        if unit.state == UnitState::Fuzzy {
            bump(&mut record, "fuzzy", unit);
        }
        // Readonly is a flag, not a state; it may co-occur with any state.
        if unit.read_only {
            bump(&mut record, "readonly", unit);
        }
        if unit.state >= UnitState::Translated {
            bump(&mut record, "translated", unit);
        } else {
            bump(&mut record, "todo", unit);
        }
        if unit.state == UnitState::Empty {
            bump(&mut record, "nottranslated", unit);
        }
        if unit.state == UnitState::Approved {
            bump(&mut record, "approved", unit);
        }
        // Translated exactly, pending approval.
        if unit.state == UnitState::Translated {
            bump(&mut record, "unapproved", unit);
        }
        if unit.labels.is_empty() {
            bump(&mut record, "unlabeled", unit);
        }
        if !unit.active_checks.is_empty() {
            bump(&mut record, "allchecks", unit);
            if unit.state == UnitState::Translated {
                bump(&mut record, "translated_checks", unit);
            }
        }
        if unit.dismissed_checks > 0 {
            bump(&mut record, "dismissed_checks", unit);
        }
        if unit.suggestions > 0 {
            bump(&mut record, "suggestions", unit);
        } else if unit.state < UnitState::Translated {
            bump(&mut record, "nosuggestions", unit);
        }
        if unit.state >= UnitState::Approved && unit.suggestions > 0 {
            bump(&mut record, "approved_suggestions", unit);
        }
        if unit.unresolved_comments > 0 {
            bump(&mut record, "comments", unit);
        }
    }

    // One language here; higher levels aggregate or count distinct.
    record.store_count("languages", 1);

    fetch_last_change(engine, node, id, &mut record).await?;
    count_changes(engine, id, &mut record).await?;

    Ok(record)
}

fn bump(record: &mut StatsRecord, partition: &str, unit: &UnitSnapshot) {
    record.store_count(partition, record.count(partition) + 1);
    let words = format!("{partition}_words");
    record.store_count(&words, record.count(&words) + unit.words as i64);
    let chars = format!("{partition}_chars");
    record.store_count(&chars, record.count(&chars) + unit.chars as i64);
}

// ----------------------------------------------------------------------
// Last change resolution
// ----------------------------------------------------------------------

/// Resolve the most recent change without a full history scan: the
/// notify-time hint first, then the cached pointer, then one fallback scan
/// that writes the pointer back.
async fn fetch_last_change(
    engine: &StatsEngine,
    node: &Arc<NodeStats>,
    id: TranslationId,
    record: &mut StatsRecord,
) -> Result<()> {
    let change = match node.last_change_hint() {
        Some(hinted) => hinted,
        None => cached_last_change(engine, id).await?,
    };
    match change {
        Some(change) => {
            record.store("last_changed", Some(MetricValue::Time(change.timestamp)));
            record.store("last_author", Some(MetricValue::Author(change.author)));
        }
        None => {
            record.store("last_changed", None);
            record.store("last_author", None);
        }
    }
    Ok(())
}

async fn cached_last_change(
    engine: &StatsEngine,
    id: TranslationId,
) -> Result<Option<ChangeRecord>> {
    let slot = last_change_key(id);
    if let Some(bytes) = engine.cache().get(&slot).await? {
        match bincode::deserialize::<LastChangePointer>(&bytes) {
            Ok(LastChangePointer::NoChanges) => return Ok(None),
            Ok(LastChangePointer::Change(change)) => return Ok(Some(change)),
            // Undecodable pointer: rescan below.
            Err(_) => {}
        }
    }
    let change = engine.source().last_change(id).await?;
    store_last_change(engine, id, change.clone()).await?;
    Ok(change)
}

/// Persist the last-change pointer for a leaf. `None` stores the explicit
/// no-changes sentinel. Exposed so the layer recording changes can keep
/// the pointer current without a rescan.
pub async fn store_last_change(
    engine: &StatsEngine,
    id: TranslationId,
    change: Option<ChangeRecord>,
) -> Result<()> {
    let slot = last_change_key(id);
    let pointer = match change {
        Some(change) => LastChangePointer::Change(change),
        None => LastChangePointer::NoChanges,
    };
    let bytes = bincode::serialize(&pointer).map_err(|source| StatsError::Encode {
        key: slot.clone(),
        source,
    })?;
    engine
        .cache()
        .set(&slot, bytes, engine.config().cache_ttl())
        .await?;
    Ok(())
}

// ----------------------------------------------------------------------
// Change activity
// ----------------------------------------------------------------------

async fn count_changes(
    engine: &StatsEngine,
    id: TranslationId,
    record: &mut StatsRecord,
) -> Result<()> {
    let Some(last_changed) = record.get("last_changed").and_then(MetricValue::as_time) else {
        // No changes at all; the zero record already holds 0 for all three.
        return Ok(());
    };
    let recent_after = last_changed - Duration::hours(RECENT_WINDOW_HOURS);
    let monthly_after = Utc::now() - Duration::days(MONTHLY_WINDOW_DAYS);
    let counts = engine
        .source()
        .change_counts(id, recent_after, monthly_after)
        .await?;
    record.store_count("recent_changes", counts.recent);
    record.store_count("monthly_changes", counts.monthly);
    record.store_count("total_changes", counts.total);
    Ok(())
}

// ----------------------------------------------------------------------
// Demand-derived breakdowns
// ----------------------------------------------------------------------

/// Compute the `check:<name>` breakdown for every known check. Checks with
/// zero occurrences are stored as explicit zeros so they are
/// distinguishable from "not yet computed".
pub(crate) async fn calculate_checks(
    engine: &StatsEngine,
    node: &Arc<NodeStats>,
    id: TranslationId,
) -> Result<()> {
    let rows = engine.source().check_stats(id).await?;
    let known = engine.source().known_checks().await?;
    store_breakdown(node, "check", rows, known);
    Ok(())
}

/// Compute the `label:<name>` breakdown for every label of the owning
/// project, zero-filling unobserved labels.
pub(crate) async fn calculate_labels(
    engine: &StatsEngine,
    node: &Arc<NodeStats>,
    id: TranslationId,
) -> Result<()> {
    let scope = engine.source().translation_scope(id).await?;
    let component = engine.source().component_scope(scope.component).await?;
    let rows = engine.source().label_stats(id).await?;
    let known = engine.source().project_labels(component.project).await?;
    store_breakdown(node, "label", rows, known);
    Ok(())
}

fn store_breakdown(
    node: &Arc<NodeStats>,
    prefix: &str,
    rows: Vec<BreakdownRow>,
    known: Vec<String>,
) {
    let mut remaining: BTreeSet<String> = known.into_iter().collect();
    for row in rows {
        let key = format!("{prefix}:{}", row.name);
        node.store_value(&key, Some(MetricValue::Count(row.strings)));
        node.store_value(&format!("{key}_words"), Some(MetricValue::Count(row.words)));
        node.store_value(&format!("{key}_chars"), Some(MetricValue::Count(row.chars)));
        remaining.remove(&row.name);
    }
    for name in remaining {
        let key = format!("{prefix}:{name}");
        node.store_value(&key, Some(MetricValue::Count(0)));
        node.store_value(&format!("{key}_words"), Some(MetricValue::Count(0)));
        node.store_value(&format!("{key}_chars"), Some(MetricValue::Count(0)));
    }
}
