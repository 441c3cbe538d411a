//! Cached completion/quality statistics over a hierarchical localization
//! workload.
//!
//! The tree runs Global → Project → Category* → Component → Translation,
//! with component lists and per-language views cutting across it. Every
//! node answers "how complete is this" from a lazily loaded, cache-persisted
//! record; translation leaves compute from raw content, composites sum
//! their children, and a changed leaf schedules deferred recomputation of
//! its ancestors.
//!
//! Collaborators are injected as traits: a [`store::CacheStore`] holding
//! the persisted records, a [`scheduler::Scheduler`] executing deferred
//! refreshes post-commit, and a [`source::ContentSource`] exposing raw
//! content. In-memory implementations of all three ship for tests and
//! single-process embedders.

pub mod config;
pub mod engine;
pub mod error;
pub mod keys;
pub mod metrics;
pub mod nodes;
pub mod record;
pub mod scheduler;
pub mod source;
pub mod store;

pub use config::StatsConfig;
pub use engine::{NodeStats, StatsEngine};
pub use error::{Result, StatsError};
pub use keys::{
    CategoryId, ComponentId, ComponentListId, LanguageId, NodeKey, ProjectId, TranslationId,
};
pub use metrics::{EngineMetrics, MetricsReport};
pub use nodes::placeholder::Placeholder;
pub use nodes::translation::store_last_change;
pub use record::{MetricValue, StatsRecord};
pub use scheduler::{ChannelScheduler, CollectingScheduler, RefreshJob, Scheduler, refresh_worker};
pub use source::{
    ChangeCounts, ChangeRecord, ContentSource, MemoryContentSource, UnitSnapshot, UnitState,
};
pub use store::{CacheStore, MemoryCacheStore};
