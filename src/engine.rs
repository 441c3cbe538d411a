//! The statistics engine: lazy cache-backed records, on-miss computation
//! dispatch and refresh propagation.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::StatsConfig;
use crate::error::{Result, StatsError};
use crate::keys::{NodeKey, basic_keys, source_keys};
use crate::metrics::EngineMetrics;
use crate::nodes::placeholder::Placeholder;
use crate::nodes::{self, aggregate, language_views, placeholder, translation};
use crate::record::{MetricValue, StatsRecord, translation_percent};
use crate::scheduler::{RefreshJob, Scheduler};
use crate::source::{ChangeRecord, ContentSource};
use crate::store::CacheStore;

/// The twelve standard percent keys merged into reporting snapshots.
const SNAPSHOT_PERCENTS: [&str; 12] = [
    "translated_percent",
    "approved_percent",
    "fuzzy_percent",
    "readonly_percent",
    "allchecks_percent",
    "translated_checks_percent",
    "translated_words_percent",
    "approved_words_percent",
    "fuzzy_words_percent",
    "readonly_words_percent",
    "allchecks_words_percent",
    "translated_checks_words_percent",
];

// ============================================================================
// NodeStats - one node's lazy cache-backed record
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) enum NodeRef {
    Tree(NodeKey),
    Placeholder(Placeholder),
}

#[derive(Default)]
struct RecordState {
    /// `None` until loaded; loading a cache miss yields an empty record.
    data: Option<StatsRecord>,
    /// Set while an on-miss calculation chain is running, so that nested
    /// misses persist exactly once at the end of the outermost one.
    pending_save: bool,
    /// Notify-time hint for the leaf's most recent change, checked before
    /// the cached pointer. Outer `None` means "not hinted".
    last_change_hint: Option<Option<ChangeRecord>>,
}

/// Handle to one node's statistics. Cheap to create; the record itself is
/// loaded lazily and shared state lives only in the cache store.
pub struct NodeStats {
    pub(crate) kind: NodeRef,
    cache_key: Option<String>,
    state: Mutex<RecordState>,
}

impl NodeStats {
    fn tree(key: NodeKey) -> Arc<Self> {
        Arc::new(Self {
            cache_key: Some(key.cache_key()),
            kind: NodeRef::Tree(key),
            state: Mutex::new(RecordState::default()),
        })
    }

    fn ghost(placeholder: Placeholder) -> Arc<Self> {
        Arc::new(Self {
            cache_key: None,
            kind: NodeRef::Placeholder(placeholder),
            state: Mutex::new(RecordState::default()),
        })
    }

    pub fn key(&self) -> Option<&NodeKey> {
        match &self.kind {
            NodeRef::Tree(key) => Some(key),
            NodeRef::Placeholder(_) => None,
        }
    }

    pub fn placeholder(&self) -> Option<&Placeholder> {
        match &self.kind {
            NodeRef::Placeholder(placeholder) => Some(placeholder),
            NodeRef::Tree(_) => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, NodeRef::Placeholder(_))
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().data.is_some()
    }

    /// Discard the process-local copy. The persisted record is untouched;
    /// the next access reloads it.
    pub fn clear_loaded(&self) {
        let mut state = self.state.lock();
        state.data = None;
        state.pending_save = false;
    }

    /// Hint the most recent change of this leaf, typically supplied by the
    /// layer that just recorded the change. `None` hints "no changes".
    pub fn set_last_change_hint(&self, change: Option<ChangeRecord>) {
        self.state.lock().last_change_hint = Some(change);
    }

    pub(crate) fn last_change_hint(&self) -> Option<Option<ChangeRecord>> {
        self.state.lock().last_change_hint.clone()
    }

    fn label(&self) -> String {
        match &self.cache_key {
            Some(key) => key.clone(),
            None => "stats-placeholder".to_string(),
        }
    }

    fn with_data<T>(&self, f: impl FnOnce(&StatsRecord) -> T) -> Option<T> {
        self.state.lock().data.as_ref().map(f)
    }

    /// Store a value into the loaded record.
    pub(crate) fn store_value(&self, key: &str, value: Option<MetricValue>) {
        let mut state = self.state.lock();
        state.data.get_or_insert_with(StatsRecord::new).store(key, value);
    }
}

// ============================================================================
// StatsEngine
// ============================================================================

/// Computes, caches and refreshes statistics for every node kind.
///
/// All shared mutable state lives in the [`CacheStore`]; the engine itself
/// can be freely cloned behind an `Arc` across workers. Concurrent writers
/// race to persist whole snapshots and the last one wins, which is sound
/// because every snapshot is internally complete.
pub struct StatsEngine {
    cache: Arc<dyn CacheStore>,
    source: Arc<dyn ContentSource>,
    scheduler: Arc<dyn Scheduler>,
    config: StatsConfig,
    metrics: Arc<EngineMetrics>,
}

impl StatsEngine {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        source: Arc<dyn ContentSource>,
        scheduler: Arc<dyn Scheduler>,
        config: StatsConfig,
    ) -> Self {
        Self {
            cache,
            source,
            scheduler,
            config,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn node(&self, key: NodeKey) -> Arc<NodeStats> {
        NodeStats::tree(key)
    }

    pub fn placeholder(&self, placeholder: Placeholder) -> Arc<NodeStats> {
        NodeStats::ghost(placeholder)
    }

    pub(crate) fn source(&self) -> &dyn ContentSource {
        self.source.as_ref()
    }

    pub(crate) fn cache(&self) -> &dyn CacheStore {
        self.cache.as_ref()
    }

    pub(crate) fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    // ------------------------------------------------------------------
    // Reading metrics
    // ------------------------------------------------------------------

    /// Resolve one metric by name.
    ///
    /// Percent keys and the `waiting_review` family are derived on every
    /// read; anything else comes from the loaded record, with a miss
    /// dispatching to the owning node kind's calculator. A name no
    /// calculator populates fails with [`StatsError::UnsupportedStat`].
    pub async fn stat(&self, node: &Arc<NodeStats>, name: &str) -> Result<MetricValue> {
        self.stat_inner(node, name).await
    }

    /// Numeric metric; `Absent` reads as 0.
    pub async fn count(&self, node: &Arc<NodeStats>, name: &str) -> Result<i64> {
        Ok(self.stat_inner(node, name).await?.as_count())
    }

    /// Percent metric as a plain float.
    pub async fn percent(&self, node: &Arc<NodeStats>, name: &str) -> Result<f64> {
        Ok(self.stat_inner(node, name).await?.as_percent())
    }

    fn stat_inner<'a>(
        &'a self,
        node: &'a Arc<NodeStats>,
        name: &'a str,
    ) -> BoxFuture<'a, Result<MetricValue>> {
        async move {
            if let Some(base) = name.strip_suffix("_percent") {
                if is_waiting_review(base) {
                    return Ok(MetricValue::Percent(
                        self.waiting_review_percent(node, base).await?,
                    ));
                }
                return Ok(MetricValue::Percent(self.calculate_percent(node, name).await?));
            }
            if is_waiting_review(name) {
                return Ok(MetricValue::Count(self.waiting_review(node, name).await?));
            }

            self.ensure_loaded(node).await?;
            if name == "stats_timestamp" {
                // Absent on never-computed records; reads as 0.
                let ts = node.with_data(StatsRecord::stats_timestamp).unwrap_or(0);
                return Ok(MetricValue::Count(ts));
            }
            if let Some(value) = node.with_data(|data| data.get(name).cloned()).flatten() {
                return Ok(value);
            }

            let was_pending = {
                let mut state = node.state.lock();
                let was = state.pending_save;
                state.pending_save = true;
                was
            };
            let computed = self.calculate_by_name(node, name).await;
            let value = node.with_data(|data| data.get(name).cloned()).flatten();
            if !was_pending {
                let saved = match (&computed, &value) {
                    (Ok(()), Some(_)) => self.save(node, true).await,
                    _ => Ok(()),
                };
                node.state.lock().pending_save = false;
                saved?;
            }
            computed?;
            value.ok_or_else(|| StatsError::UnsupportedStat {
                node: node.label(),
                name: name.to_string(),
            })
        }
        .boxed()
    }

    /// Copy of the record data with the standard percent keys merged in,
    /// for reporting surfaces.
    pub async fn snapshot_with_percents(
        &self,
        node: &Arc<NodeStats>,
    ) -> Result<BTreeMap<String, MetricValue>> {
        let mut snapshot = BTreeMap::new();
        for name in SNAPSHOT_PERCENTS {
            snapshot.insert(name.to_string(), self.stat_inner(node, name).await?);
        }
        if let Some(data) = node.with_data(StatsRecord::to_map) {
            snapshot.extend(data);
        }
        Ok(snapshot)
    }

    /// The matching per-language stats of any tree node, or a placeholder
    /// when the language is entirely absent there. Never fails on absence.
    pub async fn get_single_language_stats(
        &self,
        node: &Arc<NodeStats>,
        language: &crate::keys::LanguageId,
    ) -> Result<Arc<NodeStats>> {
        language_views::single_language_stats(self, node, language).await
    }

    /// Whether completeness of this node is defined by approval rather than
    /// plain translated state.
    pub async fn has_review(&self, node: &Arc<NodeStats>) -> Result<bool> {
        let NodeRef::Tree(key) = &node.kind else {
            return Ok(true);
        };
        match key {
            NodeKey::Translation(id) => {
                let scope = self.source.translation_scope(*id).await?;
                self.source.component_has_review(scope.component).await
            }
            NodeKey::Component(id) => self.source.component_has_review(*id).await,
            NodeKey::Project(id) | NodeKey::ProjectLanguage(id, _) => {
                self.source.project_has_review(*id).await
            }
            NodeKey::Category(id) | NodeKey::CategoryLanguage(id, _) => {
                let scope = self.source.category_scope(*id).await?;
                self.source.project_has_review(scope.project).await
            }
            NodeKey::Global | NodeKey::Language(_) | NodeKey::ComponentList(_) => Ok(true),
        }
    }

    /// Whether a language-scoped node carries the source language of its
    /// owning project.
    pub async fn is_source(&self, node: &Arc<NodeStats>) -> Result<bool> {
        let NodeRef::Tree(key) = &node.kind else {
            return Ok(false);
        };
        match key {
            NodeKey::Translation(id) => {
                let scope = self.source.translation_scope(*id).await?;
                let component = self.source.component_scope(scope.component).await?;
                let sources = self.source.source_languages(component.project).await?;
                Ok(sources.contains(&scope.language))
            }
            NodeKey::ProjectLanguage(project, language) => {
                let sources = self.source.source_languages(*project).await?;
                Ok(sources.contains(language))
            }
            NodeKey::CategoryLanguage(category, language) => {
                let scope = self.source.category_scope(*category).await?;
                let sources = self.source.source_languages(scope.project).await?;
                Ok(sources.contains(language))
            }
            _ => Ok(false),
        }
    }

    // ------------------------------------------------------------------
    // Loading & batching
    // ------------------------------------------------------------------

    async fn ensure_loaded(&self, node: &Arc<NodeStats>) -> Result<()> {
        if node.is_loaded() {
            return Ok(());
        }
        let Some(cache_key) = &node.cache_key else {
            // Placeholders have no cache slot and load as empty.
            let mut state = node.state.lock();
            state.data.get_or_insert_with(StatsRecord::new);
            return Ok(());
        };
        let loaded = match self.cache.get(cache_key).await? {
            Some(bytes) => {
                self.metrics.cache_hit();
                StatsRecord::decode(&bytes, cache_key)
            }
            None => {
                self.metrics.cache_miss();
                debug!(key = %cache_key, "stats cache miss");
                StatsRecord::new()
            }
        };
        let mut state = node.state.lock();
        state.data.get_or_insert(loaded);
        Ok(())
    }

    /// Batch-load all unloaded handles in one cache round trip. Keys with
    /// no hit become empty records; nothing falls back to individual
    /// loads. Required whenever a node enumerates many children.
    pub async fn prefetch_many(&self, handles: &[Arc<NodeStats>]) -> Result<()> {
        let mut lookup: HashMap<String, &Arc<NodeStats>> = HashMap::new();
        for handle in handles {
            if handle.is_loaded() {
                continue;
            }
            match &handle.cache_key {
                Some(key) => {
                    lookup.insert(key.clone(), handle);
                }
                None => {
                    handle.state.lock().data.get_or_insert_with(StatsRecord::new);
                }
            }
        }
        if lookup.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = lookup.keys().cloned().collect();
        let found = self.cache.get_many(&keys).await?;
        for (key, handle) in &lookup {
            let record = match found.get(key) {
                Some(bytes) => {
                    self.metrics.cache_hit();
                    StatsRecord::decode(bytes, key)
                }
                None => {
                    self.metrics.cache_miss();
                    StatsRecord::new()
                }
            };
            handle.state.lock().data.get_or_insert(record);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Computation dispatch
    // ------------------------------------------------------------------

    async fn calculate_by_name(&self, node: &Arc<NodeStats>, name: &str) -> Result<()> {
        let is_basic = match &node.kind {
            NodeRef::Tree(NodeKey::Translation(_)) => basic_keys().contains(name),
            _ => source_keys().contains(name),
        };
        if is_basic {
            self.compute_and_store_basic(node).await?;
            return Ok(());
        }
        if let NodeRef::Tree(NodeKey::Translation(id)) = &node.kind {
            if name.starts_with("check:") {
                translation::calculate_checks(self, node, *id).await?;
            } else if name.starts_with("label:") {
                translation::calculate_labels(self, node, *id).await?;
            }
        }
        Ok(())
    }

    /// Full basic record of a node, computing, storing and persisting it
    /// if the loaded record does not hold one yet.
    pub(crate) fn basic_record<'a>(
        &'a self,
        node: &'a Arc<NodeStats>,
    ) -> BoxFuture<'a, Result<StatsRecord>> {
        async move {
            self.ensure_loaded(node).await?;
            if let Some(record) = node
                .with_data(|data| data.has_basic().then(|| data.clone()))
                .flatten()
            {
                return Ok(record);
            }
            let was_pending = {
                let mut state = node.state.lock();
                let was = state.pending_save;
                state.pending_save = true;
                was
            };
            let computed = self.compute_and_store_basic(node).await;
            if !was_pending {
                let saved = match &computed {
                    Ok(()) => self.save(node, true).await,
                    Err(_) => Ok(()),
                };
                node.state.lock().pending_save = false;
                saved?;
            }
            computed?;
            Ok(node.with_data(StatsRecord::clone).unwrap_or_default())
        }
        .boxed()
    }

    async fn compute_and_store_basic(&self, node: &Arc<NodeStats>) -> Result<()> {
        self.metrics.basic_calculation();
        let computed = match &node.kind {
            NodeRef::Placeholder(ghost) => placeholder::compute_basic(self, ghost).await?,
            NodeRef::Tree(NodeKey::Translation(id)) => {
                translation::compute_basic(self, node, *id).await?
            }
            NodeRef::Tree(key) => aggregate::compute_basic(self, key).await?,
        };

        // Overlay onto whatever is loaded so demand-derived keys survive a
        // read-triggered basic computation.
        let mut merged = node.with_data(StatsRecord::clone).unwrap_or_default();
        let child_timestamp = computed.stats_timestamp();
        for (key, value) in computed.iter() {
            merged.store(key, Some(value.clone()));
        }
        let now = Utc::now().timestamp_micros();
        merged.set_stats_timestamp(child_timestamp.max(now));

        // Unchanged content keeps the previous timestamp: consecutive
        // recomputations persist byte-identical snapshots, and the
        // freshness guard can skip ancestors that already saw this state.
        if let Some(cache_key) = &node.cache_key {
            if let Some(bytes) = self.cache.get(cache_key).await? {
                let previous = StatsRecord::decode(&bytes, cache_key);
                if previous.has_basic() && previous.content_eq(&merged) {
                    merged.set_stats_timestamp(previous.stats_timestamp());
                }
            }
        }

        node.state.lock().data = Some(merged);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Percent derivation
    // ------------------------------------------------------------------

    pub(crate) async fn calculate_percent(
        &self,
        node: &Arc<NodeStats>,
        item: &str,
    ) -> Result<f64> {
        let base = item.strip_suffix("_percent").unwrap_or(item);
        let total_key = if base.ends_with("_words") {
            "all_words"
        } else if base.ends_with("_chars") {
            "all_chars"
        } else {
            "all"
        };
        let total = self.count(node, total_key).await? as f64;
        let part = self.count(node, base).await? as f64;
        let zero_complete = if self.has_review(node).await? {
            matches!(base, "approved" | "approved_words" | "approved_chars")
        } else {
            matches!(base, "translated" | "translated_words" | "translated_chars")
        };
        Ok(translation_percent(part, total, zero_complete))
    }

    async fn waiting_review(&self, node: &Arc<NodeStats>, name: &str) -> Result<i64> {
        let suffix = name.strip_prefix("waiting_review").unwrap_or_default();
        let translated = self.count(node, &format!("translated{suffix}")).await?;
        let approved = self.count(node, &format!("approved{suffix}")).await?;
        let readonly = self.count(node, &format!("readonly{suffix}")).await?;
        // May go negative when readonly overlaps translated; reported as is.
        Ok(translated - approved - readonly)
    }

    async fn waiting_review_percent(&self, node: &Arc<NodeStats>, base: &str) -> Result<f64> {
        let suffix = base.strip_prefix("waiting_review").unwrap_or_default();
        let translated = self
            .percent(node, &format!("translated{suffix}_percent"))
            .await?;
        let approved = self
            .percent(node, &format!("approved{suffix}_percent"))
            .await?;
        let readonly = self
            .percent(node, &format!("readonly{suffix}_percent"))
            .await?;
        Ok(translated - approved - readonly)
    }

    // ------------------------------------------------------------------
    // Persistence & refresh propagation
    // ------------------------------------------------------------------

    pub(crate) async fn save(&self, node: &Arc<NodeStats>, propagate: bool) -> Result<()> {
        let Some(cache_key) = &node.cache_key else {
            return Ok(());
        };
        let Some(record) = node.with_data(StatsRecord::clone) else {
            return Ok(());
        };
        let bytes = record.encode(cache_key)?;
        self.cache
            .set(cache_key, bytes, self.config.cache_ttl())
            .await?;
        self.metrics.record_save();

        // Only leaf saves notify; composite refreshes are themselves the
        // product of a leaf notification.
        if propagate {
            if let NodeRef::Tree(key @ NodeKey::Translation(_)) = &node.kind {
                self.scheduler
                    .schedule_after_commit(RefreshJob { node: key.clone() })
                    .await?;
                self.metrics.refresh_scheduled();
            }
        }
        Ok(())
    }

    /// Invalidate and refresh one node. Lazy mode persists an empty marker
    /// and defers the recomputation to the next read; eager mode computes
    /// immediately. Leaf refreshes notify ancestors unless `propagate` is
    /// off.
    pub async fn update_stats(&self, node: &Arc<NodeStats>, propagate: bool) -> Result<()> {
        {
            let mut state = node.state.lock();
            state.data = Some(StatsRecord::new());
            state.pending_save = false;
        }
        if !self.config.lazy {
            self.compute_and_store_basic(node).await?;
        }
        self.save(node, propagate).await
    }

    /// Execute one deferred refresh job: recompute every stale strict
    /// ancestor (and secondary-axis sibling) of the job's node.
    pub async fn process_refresh(&self, job: &RefreshJob) -> Result<()> {
        let node = self.node(job.node.clone());
        let trigger = self.count(&node, "stats_timestamp").await?;
        self.update_parents(&node, trigger, Vec::new()).await
    }

    /// Recompute the given node's refresh targets, deduplicated by cache
    /// key with the closest ancestors first. Targets whose persisted
    /// timestamp is at least as fresh as `trigger` are skipped, so several
    /// leaves changing under a shared ancestor in one window do not cause
    /// redundant work.
    pub(crate) async fn update_parents(
        &self,
        node: &Arc<NodeStats>,
        trigger: i64,
        extra: Vec<NodeKey>,
    ) -> Result<()> {
        let NodeRef::Tree(key) = &node.kind else {
            return Ok(());
        };
        let mut targets = nodes::refresh_targets(self, key).await?;
        targets.extend(extra);

        let mut seen = HashSet::new();
        targets.retain(|target| seen.insert(target.cache_key()));

        let handles: Vec<_> = targets.into_iter().map(|key| self.node(key)).collect();
        self.prefetch_many(&handles).await?;

        for target in &handles {
            let target_ts = target.with_data(StatsRecord::stats_timestamp).unwrap_or(0);
            if trigger != 0 && trigger <= target_ts {
                self.metrics.refresh_skipped();
                continue;
            }
            debug!(node = %target.label(), "updating stats");
            self.update_stats(target, false).await?;
        }
        Ok(())
    }

    /// Recompute a whole component subtree: every translation (without
    /// per-leaf notification), the component itself, then one deduplicated
    /// ancestor pass covering everything the leaves would have notified.
    pub async fn refresh_component_tree(&self, component: crate::keys::ComponentId) -> Result<()> {
        aggregate::refresh_component_tree(self, component).await
    }
}

#[inline]
fn is_waiting_review(name: &str) -> bool {
    matches!(
        name,
        "waiting_review" | "waiting_review_words" | "waiting_review_chars"
    )
}
