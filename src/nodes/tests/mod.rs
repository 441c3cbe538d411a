//! Suites for the node calculators, wired to the in-memory collaborators.

mod aggregation;
mod placeholders;
mod refresh;
mod views;

use std::sync::Arc;

use crate::config::StatsConfig;
use crate::engine::StatsEngine;
use crate::keys::{
    CategoryId, ComponentId, ComponentListId, LanguageId, NodeKey, ProjectId, TranslationId,
};
use crate::scheduler::CollectingScheduler;
use crate::source::{MemoryContentSource, UnitSnapshot, UnitState};
use crate::store::MemoryCacheStore;

/// Engine plus handles to its collaborators, kept concrete so tests can
/// assert on persisted bytes and scheduled jobs.
struct Harness {
    engine: StatsEngine,
    cache: Arc<MemoryCacheStore>,
    source: Arc<MemoryContentSource>,
    scheduler: Arc<CollectingScheduler>,
}

impl Harness {
    fn with_config(config: StatsConfig) -> Self {
        let cache = Arc::new(MemoryCacheStore::new());
        let source = Arc::new(MemoryContentSource::new());
        let scheduler = Arc::new(CollectingScheduler::new());
        let engine = StatsEngine::new(cache.clone(), source.clone(), scheduler.clone(), config);
        Self {
            engine,
            cache,
            source,
            scheduler,
        }
    }

    fn new() -> Self {
        Self::with_config(StatsConfig::default())
    }

    /// Drain and execute every refresh job scheduled so far.
    async fn run_refreshes(&self) {
        for job in self.scheduler.drain() {
            self.engine.process_refresh(&job).await.expect("refresh job");
        }
    }
}

fn lang(code: &str) -> LanguageId {
    LanguageId::new(code)
}

fn unit(state: UnitState, words: u32) -> UnitSnapshot {
    UnitSnapshot {
        state,
        words,
        chars: words * 6,
        ..UnitSnapshot::default()
    }
}

fn batch(state: UnitState, count: usize, words: u32) -> Vec<UnitSnapshot> {
    (0..count).map(|_| unit(state, words)).collect()
}

/// One review-enabled project holding a root component and a categorized
/// component, each with an English source translation and a Czech
/// translation, plus a component list over both.
///
/// Per-leaf totals: root source 10 strings / 40 words, root Czech 6 of 10
/// translated, nested source 5 / 10, nested Czech 2 of 5 translated.
struct SampleWorld {
    project: ProjectId,
    category: CategoryId,
    root_component: ComponentId,
    nested_component: ComponentId,
    list: ComponentListId,
    root_source: TranslationId,
    root_czech: TranslationId,
    nested_source: TranslationId,
    nested_czech: TranslationId,
}

fn sample_world(harness: &Harness) -> SampleWorld {
    let world = SampleWorld {
        project: ProjectId(1),
        category: CategoryId(5),
        root_component: ComponentId(10),
        nested_component: ComponentId(11),
        list: ComponentListId(70),
        root_source: TranslationId(100),
        root_czech: TranslationId(101),
        nested_source: TranslationId(110),
        nested_czech: TranslationId(111),
    };
    let source = &harness.source;
    source.add_project(world.project, true, lang("en"));
    source.add_category(world.category, world.project, None);
    source.add_component(world.root_component, world.project, None, true);
    source.add_component(
        world.nested_component,
        world.project,
        Some(world.category),
        true,
    );
    source.add_component_list(
        world.list,
        vec![world.root_component, world.nested_component],
    );

    source.add_translation(
        world.root_source,
        world.root_component,
        lang("en"),
        batch(UnitState::Translated, 10, 4),
    );
    source.add_translation(world.root_czech, world.root_component, lang("cs"), {
        let mut units = batch(UnitState::Translated, 6, 4);
        units.extend(batch(UnitState::Empty, 4, 4));
        units
    });
    source.set_source_translation(world.root_component, world.root_source);

    source.add_translation(
        world.nested_source,
        world.nested_component,
        lang("en"),
        batch(UnitState::Translated, 5, 2),
    );
    source.add_translation(world.nested_czech, world.nested_component, lang("cs"), {
        let mut units = batch(UnitState::Translated, 2, 2);
        units.extend(batch(UnitState::Empty, 3, 2));
        units
    });
    source.set_source_translation(world.nested_component, world.nested_source);

    world
}
