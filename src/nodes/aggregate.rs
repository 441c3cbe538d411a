//! Hierarchical aggregation for composite nodes.

use std::sync::Arc;

use crate::engine::{NodeStats, StatsEngine};
use crate::error::Result;
use crate::keys::{ComponentId, NodeKey, basic_keys, source_keys, source_measure_keys};
use crate::record::StatsRecord;
use crate::source::LanguageScope;

/// How a composite derives its `source_*` measures.
enum SourceMode {
    /// Children carry proper `source_*` values already; sum them.
    Sum,
    /// Children are translations: sum their `all*` totals.
    FromChildAll,
    /// Copy verbatim from the component's one source translation. Summing
    /// would double-count it, since the translation set includes it.
    SourceTranslation(Option<crate::keys::TranslationId>),
}

/// Sum a composite node's immediate children into one record.
///
/// `object_set` children contribute their basic keys with type-dependent
/// `source_*` handling; `category_set` children contribute their full key
/// set. `last_changed`/`last_author` follow the most recent contributor and
/// the timestamp takes the maximum; an empty child set yields all zeros.
pub(crate) async fn compute_basic(engine: &StatsEngine, key: &NodeKey) -> Result<StatsRecord> {
    let (objects, groups) = child_sets(engine, key).await?;

    let object_nodes: Vec<Arc<NodeStats>> =
        objects.into_iter().map(|child| engine.node(child)).collect();
    let group_nodes: Vec<Arc<NodeStats>> =
        groups.into_iter().map(|child| engine.node(child)).collect();
    let all_nodes: Vec<Arc<NodeStats>> = object_nodes
        .iter()
        .chain(group_nodes.iter())
        .cloned()
        .collect();
    engine.prefetch_many(&all_nodes).await?;

    let mode = source_mode(engine, key).await?;
    let mut record = StatsRecord::zero(source_keys());
    let mut source_record: Option<StatsRecord> = None;

    for child in &object_nodes {
        let child_record = engine.basic_record(child).await?;
        record.aggregate_from(&child_record, basic_keys());
        match &mode {
            SourceMode::Sum => record.aggregate_from(&child_record, source_measure_keys()),
            SourceMode::FromChildAll => record.add_source_from_all(&child_record),
            SourceMode::SourceTranslation(source) => {
                if let Some(NodeKey::Translation(id)) = child.key() {
                    if Some(*id) == *source {
                        source_record = Some(child_record);
                    }
                }
            }
        }
    }
    for group in &group_nodes {
        let group_record = engine.basic_record(group).await?;
        // Sub-groups have proper source_* values; full aggregation.
        record.aggregate_from(&group_record, source_keys());
    }

    if let SourceMode::SourceTranslation(_) = &mode {
        // Missing source translation leaves the zeros in place.
        if let Some(source) = source_record {
            record.store_count("source_strings", source.count("all"));
            record.store_count("source_words", source.count("all_words"));
            record.store_count("source_chars", source.count("all_chars"));
        }
    }

    // Distinct language counts where summing would double-count languages
    // shared across children.
    match key {
        NodeKey::Project(id) => {
            let languages = engine.source().project_languages(*id).await?;
            record.store_count("languages", languages.len() as i64);
        }
        NodeKey::Global => {
            let languages = engine.source().languages_with_translations().await?;
            record.store_count("languages", languages.len() as i64);
        }
        NodeKey::Language(_) | NodeKey::ProjectLanguage(..) | NodeKey::CategoryLanguage(..) => {
            record.store_count("languages", 1);
        }
        _ => {}
    }

    Ok(record)
}

/// Immediate children of a composite: `(object_set, category_set)`, two
/// disjoint collections.
async fn child_sets(engine: &StatsEngine, key: &NodeKey) -> Result<(Vec<NodeKey>, Vec<NodeKey>)> {
    let source = engine.source();
    Ok(match key {
        NodeKey::Global => (
            source
                .projects()
                .await?
                .into_iter()
                .map(NodeKey::Project)
                .collect(),
            Vec::new(),
        ),
        NodeKey::Project(id) => (
            source
                .project_root_components(*id)
                .await?
                .into_iter()
                .map(NodeKey::Component)
                .collect(),
            source
                .project_root_categories(*id)
                .await?
                .into_iter()
                .map(NodeKey::Category)
                .collect(),
        ),
        NodeKey::Category(id) => (
            source
                .category_components(*id)
                .await?
                .into_iter()
                .map(NodeKey::Component)
                .collect(),
            source
                .category_categories(*id)
                .await?
                .into_iter()
                .map(NodeKey::Category)
                .collect(),
        ),
        NodeKey::Component(id) => (
            source
                .component_translations(*id)
                .await?
                .into_iter()
                .map(NodeKey::Translation)
                .collect(),
            Vec::new(),
        ),
        NodeKey::ComponentList(id) => (
            source
                .component_list_members(*id)
                .await?
                .into_iter()
                .map(NodeKey::Component)
                .collect(),
            Vec::new(),
        ),
        NodeKey::Language(language) => (
            source
                .language_translations(language.clone())
                .await?
                .into_iter()
                .map(NodeKey::Translation)
                .collect(),
            Vec::new(),
        ),
        // Secondary-axis views: the transitive scope filter already covers
        // descendants, so there is no category_set.
        NodeKey::ProjectLanguage(project, language) => (
            source
                .scope_language_translations(LanguageScope::Project(*project), language)
                .await?
                .into_iter()
                .map(NodeKey::Translation)
                .collect(),
            Vec::new(),
        ),
        NodeKey::CategoryLanguage(category, language) => (
            source
                .scope_language_translations(LanguageScope::Category(*category), language)
                .await?
                .into_iter()
                .map(NodeKey::Translation)
                .collect(),
            Vec::new(),
        ),
        NodeKey::Translation(_) => {
            unreachable!("translation leaves compute from raw content")
        }
    })
}

async fn source_mode(engine: &StatsEngine, key: &NodeKey) -> Result<SourceMode> {
    Ok(match key {
        NodeKey::Component(id) => {
            SourceMode::SourceTranslation(engine.source().source_translation(*id).await?)
        }
        NodeKey::Language(_) | NodeKey::ProjectLanguage(..) | NodeKey::CategoryLanguage(..) => {
            SourceMode::FromChildAll
        }
        _ => SourceMode::Sum,
    })
}

/// Full refresh of a component subtree: every translation without per-leaf
/// notification, the component itself, then one deduplicated ancestor pass
/// covering everything the leaves would have notified.
pub(crate) async fn refresh_component_tree(
    engine: &StatsEngine,
    component: ComponentId,
) -> Result<()> {
    let translations = engine.source().component_translations(component).await?;
    let mut extra = Vec::new();
    for id in translations {
        let leaf = engine.node(NodeKey::Translation(id));
        engine.update_stats(&leaf, false).await?;
        extra.extend(super::refresh_targets(engine, &NodeKey::Translation(id)).await?);
    }

    let node = engine.node(NodeKey::Component(component));
    engine.update_stats(&node, false).await?;

    // The component itself was just recomputed; keep it out of the pass.
    extra.retain(|target| *target != NodeKey::Component(component));
    let trigger = engine.count(&node, "stats_timestamp").await?;
    engine.update_parents(&node, trigger, extra).await
}
