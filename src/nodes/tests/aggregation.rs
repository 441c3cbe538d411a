//! Composite aggregation over the entity tree.

use chrono::{TimeZone, Utc};

use super::*;
use crate::record::MetricValue;
use crate::source::ChangeRecord;

#[tokio::test]
async fn component_sums_translations_and_copies_source() {
    let harness = Harness::new();
    let source = &harness.source;
    source.add_project(ProjectId(1), true, lang("en"));
    source.add_component(ComponentId(10), ProjectId(1), None, true);
    source.add_translation(
        TranslationId(100),
        ComponentId(10),
        lang("en"),
        batch(UnitState::Translated, 20, 5),
    );
    source.add_translation(TranslationId(101), ComponentId(10), lang("cs"), {
        let mut units = batch(UnitState::Translated, 10, 5);
        units.extend(batch(UnitState::Empty, 10, 5));
        units
    });
    source.set_source_translation(ComponentId(10), TranslationId(100));

    let engine = &harness.engine;
    let node = engine.node(NodeKey::Component(ComponentId(10)));
    assert_eq!(engine.count(&node, "all").await.expect("all"), 40);
    assert_eq!(engine.count(&node, "all_words").await.expect("words"), 200);
    assert_eq!(engine.count(&node, "translated").await.expect("translated"), 30);
    // Copied from the source translation, not summed over children.
    assert_eq!(
        engine.count(&node, "source_strings").await.expect("source"),
        20
    );
    assert_eq!(
        engine.count(&node, "source_words").await.expect("source"),
        100
    );
    assert_eq!(engine.count(&node, "languages").await.expect("languages"), 2);
}

#[tokio::test]
async fn parents_sum_children() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let category = engine.node(NodeKey::Category(world.category));
    assert_eq!(engine.count(&category, "all").await.expect("all"), 10);
    assert_eq!(
        engine.count(&category, "translated").await.expect("translated"),
        7
    );
    assert_eq!(
        engine.count(&category, "source_strings").await.expect("source"),
        5
    );

    let project = engine.node(NodeKey::Project(world.project));
    assert_eq!(engine.count(&project, "all").await.expect("all"), 30);
    assert_eq!(
        engine.count(&project, "translated").await.expect("translated"),
        23
    );
    assert_eq!(
        engine.count(&project, "source_strings").await.expect("source"),
        15
    );
    // Distinct languages, not the per-child sum.
    assert_eq!(engine.count(&project, "languages").await.expect("languages"), 2);

    let global = engine.node(NodeKey::Global);
    assert_eq!(engine.count(&global, "all").await.expect("all"), 30);
    assert_eq!(engine.count(&global, "languages").await.expect("languages"), 2);

    let list = engine.node(NodeKey::ComponentList(world.list));
    assert_eq!(engine.count(&list, "all").await.expect("all"), 30);
    assert_eq!(
        engine.count(&list, "source_strings").await.expect("source"),
        15
    );
}

#[tokio::test]
async fn last_change_follows_most_recent_child() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let older = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
    let newer = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
    harness.source.record_change(
        world.root_czech,
        ChangeRecord {
            timestamp: older,
            author: "ada".to_string(),
        },
    );
    harness.source.record_change(
        world.nested_source,
        ChangeRecord {
            timestamp: newer,
            author: "grace".to_string(),
        },
    );

    let engine = &harness.engine;
    let project = engine.node(NodeKey::Project(world.project));
    assert_eq!(
        engine.stat(&project, "last_changed").await.expect("last"),
        MetricValue::Time(newer)
    );
    assert_eq!(
        engine.stat(&project, "last_author").await.expect("author"),
        MetricValue::Author("grace".to_string())
    );

    let global = engine.node(NodeKey::Global);
    assert_eq!(
        engine.stat(&global, "last_changed").await.expect("last"),
        MetricValue::Time(newer)
    );
}

#[tokio::test]
async fn empty_project_aggregates_to_zero() {
    let harness = Harness::new();
    harness.source.add_project(ProjectId(2), true, lang("en"));

    let engine = &harness.engine;
    let node = engine.node(NodeKey::Project(ProjectId(2)));
    assert_eq!(engine.count(&node, "all").await.expect("all"), 0);
    assert_eq!(engine.count(&node, "languages").await.expect("languages"), 0);
    assert_eq!(
        engine.stat(&node, "last_changed").await.expect("last"),
        MetricValue::Absent
    );
}

#[tokio::test]
async fn unchanged_recomputation_persists_identical_bytes() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    engine.count(&leaf, "all").await.expect("all");
    let first = harness.cache.peek("stats-translation-101").expect("persisted");
    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    engine.update_stats(&leaf, false).await.expect("update");
    let second = harness.cache.peek("stats-translation-101").expect("persisted");
    assert_eq!(first, second);

    let component = engine.node(NodeKey::Component(world.root_component));
    engine.count(&component, "all").await.expect("all");
    let first = harness.cache.peek("stats-component-10").expect("persisted");
    let component = engine.node(NodeKey::Component(world.root_component));
    engine.update_stats(&component, false).await.expect("update");
    let second = harness.cache.peek("stats-component-10").expect("persisted");
    assert_eq!(first, second);
}

#[tokio::test]
async fn composite_timestamp_covers_children() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    engine.count(&leaf, "all").await.expect("all");
    let leaf_ts = engine.count(&leaf, "stats_timestamp").await.expect("ts");
    assert!(leaf_ts > 0);

    let project = engine.node(NodeKey::Project(world.project));
    engine.count(&project, "all").await.expect("all");
    let project_ts = engine.count(&project, "stats_timestamp").await.expect("ts");
    assert!(project_ts >= leaf_ts);
}
