//! Per-language resolution across the tree.

use super::*;
use crate::record::MetricValue;

#[tokio::test]
async fn project_view_filters_to_one_language() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let project = engine.node(NodeKey::Project(world.project));
    let view = engine
        .get_single_language_stats(&project, &lang("cs"))
        .await
        .expect("view");
    assert_eq!(
        view.key(),
        Some(&NodeKey::ProjectLanguage(world.project, lang("cs")))
    );
    assert_eq!(engine.count(&view, "all").await.expect("all"), 15);
    assert_eq!(engine.count(&view, "translated").await.expect("translated"), 8);
    assert_eq!(engine.count(&view, "languages").await.expect("languages"), 1);
    // Children are leaves; their totals become the source measures.
    assert_eq!(
        engine.count(&view, "source_strings").await.expect("source"),
        15
    );
    assert_eq!(
        engine.count(&view, "source_words").await.expect("source"),
        50
    );
}

#[tokio::test]
async fn absent_language_reads_as_zero() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let project = engine.node(NodeKey::Project(world.project));
    let view = engine
        .get_single_language_stats(&project, &lang("de"))
        .await
        .expect("view");
    assert!(view.is_placeholder());
    assert_eq!(engine.count(&view, "all").await.expect("all"), 0);
    assert_eq!(
        engine.stat(&view, "last_changed").await.expect("last"),
        MetricValue::Absent
    );

    let global = engine.node(NodeKey::Global);
    let present = engine
        .get_single_language_stats(&global, &lang("cs"))
        .await
        .expect("view");
    assert_eq!(present.key(), Some(&NodeKey::Language(lang("cs"))));
    let missing = engine
        .get_single_language_stats(&global, &lang("de"))
        .await
        .expect("view");
    assert!(missing.is_placeholder());
}

#[tokio::test]
async fn category_view_covers_nested_categories() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let source = &harness.source;
    source.add_category(CategoryId(6), world.project, Some(world.category));
    source.add_component(ComponentId(12), world.project, Some(CategoryId(6)), true);
    source.add_translation(
        TranslationId(120),
        ComponentId(12),
        lang("cs"),
        batch(UnitState::Translated, 3, 1),
    );

    let engine = &harness.engine;
    let category = engine.node(NodeKey::Category(world.category));
    let view = engine
        .get_single_language_stats(&category, &lang("cs"))
        .await
        .expect("view");
    assert_eq!(
        view.key(),
        Some(&NodeKey::CategoryLanguage(world.category, lang("cs")))
    );
    // Nested Czech (5) plus the deeper component's Czech (3).
    assert_eq!(engine.count(&view, "all").await.expect("all"), 8);
}

#[tokio::test]
async fn shared_component_counts_in_project_view() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    harness.source.add_project(ProjectId(2), true, lang("en"));
    harness.source.share_component(world.root_component, ProjectId(2));

    let engine = &harness.engine;
    let project = engine.node(NodeKey::Project(ProjectId(2)));
    let view = engine
        .get_single_language_stats(&project, &lang("cs"))
        .await
        .expect("view");
    assert_eq!(
        view.key(),
        Some(&NodeKey::ProjectLanguage(ProjectId(2), lang("cs")))
    );
    assert_eq!(engine.count(&view, "all").await.expect("all"), 10);
}

#[tokio::test]
async fn missing_component_language_mirrors_source_as_todo() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let component = engine.node(NodeKey::Component(world.root_component));
    let view = engine
        .get_single_language_stats(&component, &lang("de"))
        .await
        .expect("view");
    assert!(view.is_placeholder());
    let ghost = view.placeholder().expect("placeholder");
    assert_eq!(ghost.language, Some(lang("de")));
    assert_eq!(ghost.component, Some(world.root_component));
    assert_eq!(ghost.baseline, Some(NodeKey::Translation(world.root_source)));

    // Everything the source holds is still to translate here.
    assert_eq!(engine.count(&view, "all").await.expect("all"), 10);
    assert_eq!(engine.count(&view, "todo").await.expect("todo"), 10);
    assert_eq!(engine.count(&view, "all_words").await.expect("words"), 40);
    assert_eq!(engine.count(&view, "translated").await.expect("translated"), 0);
}

#[tokio::test]
async fn leaf_and_axis_nodes_answer_for_themselves() {
    let harness = Harness::new();
    let world = sample_world(&harness);
    let engine = &harness.engine;

    let leaf = engine.node(NodeKey::Translation(world.root_czech));
    let same = engine
        .get_single_language_stats(&leaf, &lang("cs"))
        .await
        .expect("view");
    assert_eq!(same.key(), Some(&NodeKey::Translation(world.root_czech)));
    let other = engine
        .get_single_language_stats(&leaf, &lang("de"))
        .await
        .expect("view");
    assert!(other.is_placeholder());

    // Component lists have no language axis.
    let list = engine.node(NodeKey::ComponentList(world.list));
    let view = engine
        .get_single_language_stats(&list, &lang("cs"))
        .await
        .expect("view");
    assert!(view.is_placeholder());
}
