//! Deferred refresh propagation after leaf changes.

use super::*;
use crate::nodes::refresh_targets;
use crate::record::StatsRecord;
use crate::scheduler::RefreshJob;

#[tokio::test]
async fn leaf_computation_schedules_one_notification() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    engine.count(&leaf, "all").await.expect("all");

    let jobs = harness.scheduler.drain();
    assert_eq!(
        jobs,
        vec![RefreshJob {
            node: NodeKey::Translation(world.root_czech),
        }]
    );
    assert_eq!(engine.metrics().snapshot().refreshes_scheduled, 1);
}

#[tokio::test]
async fn targets_run_closest_first() {
    let harness = Harness::new();
    let world = sample_world(&harness);

    let targets = refresh_targets(
        &harness.engine,
        &NodeKey::Translation(world.nested_czech),
    )
    .await
    .expect("targets");
    assert_eq!(
        targets,
        vec![
            NodeKey::Language(lang("cs")),
            NodeKey::Component(world.nested_component),
            NodeKey::Category(world.category),
            NodeKey::Project(world.project),
            NodeKey::ComponentList(world.list),
            NodeKey::CategoryLanguage(world.category, lang("cs")),
            NodeKey::ProjectLanguage(world.project, lang("cs")),
            NodeKey::Global,
        ]
    );
}

#[tokio::test]
async fn processing_a_job_updates_stale_ancestors() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let global = engine.node(NodeKey::Global);
    assert_eq!(engine.count(&global, "translated").await.expect("translated"), 23);
    harness.scheduler.drain();

    // The root Czech translation gets finished.
    harness
        .source
        .set_units(world.root_czech, batch(UnitState::Translated, 10, 4));
    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    engine.update_stats(&leaf, true).await.expect("update");
    harness.run_refreshes().await;

    let global = engine.node(NodeKey::Global);
    assert_eq!(engine.count(&global, "translated").await.expect("translated"), 27);
    let project = engine.node(NodeKey::Project(world.project));
    assert_eq!(engine.count(&project, "translated").await.expect("translated"), 27);
    let view = engine.node(NodeKey::ProjectLanguage(world.project, lang("cs")));
    assert_eq!(engine.count(&view, "translated").await.expect("translated"), 12);
}

#[tokio::test]
async fn fresh_ancestors_are_skipped() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    engine.count(&leaf, "all").await.expect("all");
    let job = RefreshJob {
        node: NodeKey::Translation(world.root_czech),
    };
    engine.process_refresh(&job).await.expect("first pass");

    // Same trigger again: every ancestor already carries a timestamp at
    // least as fresh, so nothing is recomputed.
    let before = engine.metrics().snapshot().refreshes_skipped;
    engine.process_refresh(&job).await.expect("second pass");
    let after = engine.metrics().snapshot().refreshes_skipped;
    assert_eq!(after - before, 6);
}

#[tokio::test]
async fn lazy_mode_defers_recomputation_to_the_next_read() {
    let harness = Harness::with_config(StatsConfig {
        lazy: true,
        ..StatsConfig::default()
    });
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    engine.update_stats(&leaf, true).await.expect("update");

    // Only the empty marker is persisted.
    let bytes = harness.cache.peek("stats-translation-101").expect("marker");
    assert!(StatsRecord::decode(&bytes, "stats-translation-101").is_empty());

    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    assert_eq!(engine.count(&leaf, "translated").await.expect("translated"), 6);
    let bytes = harness.cache.peek("stats-translation-101").expect("record");
    assert!(StatsRecord::decode(&bytes, "stats-translation-101").has_basic());
}

#[tokio::test]
async fn component_tree_refresh_rebuilds_subtree_and_ancestors() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let global = engine.node(NodeKey::Global);
    assert_eq!(engine.count(&global, "translated").await.expect("translated"), 23);
    harness.scheduler.drain();

    harness
        .source
        .set_units(world.nested_czech, batch(UnitState::Translated, 5, 2));
    engine
        .refresh_component_tree(world.nested_component)
        .await
        .expect("refresh tree");

    let component = engine.node(NodeKey::Component(world.nested_component));
    assert_eq!(
        engine.count(&component, "translated").await.expect("translated"),
        10
    );
    let category = engine.node(NodeKey::Category(world.category));
    assert_eq!(
        engine.count(&category, "translated").await.expect("translated"),
        10
    );
    let global = engine.node(NodeKey::Global);
    assert_eq!(engine.count(&global, "translated").await.expect("translated"), 26);
    // The tree refresh itself issues no further notifications.
    assert!(harness.scheduler.is_empty());
}
