//! Placeholder stand-ins for absent combinations.

use super::*;
use crate::nodes::placeholder::Placeholder;

#[tokio::test]
async fn baseline_mirrors_totals_as_todo() {
    let harness = Harness::new();
    let source = &harness.source;
    source.add_project(ProjectId(1), true, lang("en"));
    source.add_component(ComponentId(10), ProjectId(1), None, true);
    let units: Vec<UnitSnapshot> = (0..50)
        .map(|_| UnitSnapshot {
            state: UnitState::Translated,
            words: 4,
            chars: 18,
            ..UnitSnapshot::default()
        })
        .collect();
    source.add_translation(TranslationId(100), ComponentId(10), lang("en"), units);

    let engine = &harness.engine;
    let ghost = engine.placeholder(Placeholder::with_baseline(NodeKey::Translation(
        TranslationId(100),
    )));
    assert_eq!(engine.count(&ghost, "all").await.expect("all"), 50);
    assert_eq!(engine.count(&ghost, "all_words").await.expect("words"), 200);
    assert_eq!(engine.count(&ghost, "all_chars").await.expect("chars"), 900);
    assert_eq!(engine.count(&ghost, "todo").await.expect("todo"), 50);
    assert_eq!(engine.count(&ghost, "todo_words").await.expect("words"), 200);
    assert_eq!(engine.count(&ghost, "translated").await.expect("translated"), 0);

    // Only the baseline leaf hit the cache: its record plus its
    // last-change pointer. The placeholder itself has no slot.
    assert_eq!(harness.cache.len(), 2);
    assert!(harness.cache.peek("stats-translation-100").is_some());
}

#[tokio::test]
async fn zero_placeholder_reads_zero_and_never_persists() {
    let harness = Harness::new();
    let engine = &harness.engine;

    let ghost = engine.placeholder(Placeholder::zero());
    assert_eq!(engine.count(&ghost, "all").await.expect("all"), 0);
    assert_eq!(engine.count(&ghost, "source_strings").await.expect("source"), 0);
    // Placeholders report review workflow, so completion is approval-based.
    assert_eq!(
        engine.percent(&ghost, "approved_percent").await.expect("percent"),
        100.0
    );
    assert_eq!(
        engine.percent(&ghost, "translated_percent").await.expect("percent"),
        0.0
    );

    assert!(harness.cache.is_empty());
    assert!(harness.scheduler.is_empty());
}
