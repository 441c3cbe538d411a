//! Node-kind calculators.
//!
//! Each node kind contributes a `compute_basic` the engine dispatches to:
//! - [`translation`]: the leaf, computing from raw content
//! - [`aggregate`]: composite nodes summing their children
//! - [`language_views`]: secondary-axis (scope x language) pseudo-nodes
//! - [`placeholder`]: non-persisted stand-ins for absent combinations

pub(crate) mod aggregate;
pub(crate) mod language_views;
pub mod placeholder;
pub(crate) mod translation;

use crate::engine::StatsEngine;
use crate::error::Result;
use crate::keys::{CategoryId, NodeKey};

/// Every strict ancestor (and secondary-axis sibling) to refresh after this
/// node changes, closest first. Callers deduplicate by cache key.
pub(crate) async fn refresh_targets(engine: &StatsEngine, key: &NodeKey) -> Result<Vec<NodeKey>> {
    let source = engine.source();
    let mut targets = Vec::new();
    match key {
        NodeKey::Global => {}
        NodeKey::Project(_)
        | NodeKey::Language(_)
        | NodeKey::ComponentList(_)
        | NodeKey::ProjectLanguage(..)
        | NodeKey::CategoryLanguage(..) => targets.push(NodeKey::Global),
        NodeKey::Category(id) => {
            let scope = source.category_scope(*id).await?;
            for category in category_chain(engine, scope.parent).await? {
                targets.push(NodeKey::Category(category));
            }
            targets.push(NodeKey::Project(scope.project));
            targets.push(NodeKey::Global);
        }
        NodeKey::Component(id) => {
            let scope = source.component_scope(*id).await?;
            for category in category_chain(engine, scope.category).await? {
                targets.push(NodeKey::Category(category));
            }
            targets.push(NodeKey::Project(scope.project));
            for list in source.component_lists_with(*id).await? {
                targets.push(NodeKey::ComponentList(list));
            }
            targets.push(NodeKey::Global);
        }
        NodeKey::Translation(id) => {
            let scope = source.translation_scope(*id).await?;
            let language = scope.language;
            let component_scope = source.component_scope(scope.component).await?;
            let chain = category_chain(engine, component_scope.category).await?;

            targets.push(NodeKey::Language(language.clone()));
            targets.push(NodeKey::Component(scope.component));
            for category in &chain {
                targets.push(NodeKey::Category(*category));
            }
            targets.push(NodeKey::Project(component_scope.project));
            for list in source.component_lists_with(scope.component).await? {
                targets.push(NodeKey::ComponentList(list));
            }
            // Secondary-axis siblings of the changed leaf.
            for category in &chain {
                targets.push(NodeKey::CategoryLanguage(*category, language.clone()));
            }
            targets.push(NodeKey::ProjectLanguage(
                component_scope.project,
                language.clone(),
            ));
            targets.push(NodeKey::Global);
        }
    }
    Ok(targets)
}

/// Category ancestry starting at `from`, closest first.
async fn category_chain(
    engine: &StatsEngine,
    from: Option<CategoryId>,
) -> Result<Vec<CategoryId>> {
    let mut chain = Vec::new();
    let mut current = from;
    while let Some(category) = current {
        chain.push(category);
        current = engine.source().category_scope(category).await?.parent;
    }
    Ok(chain)
}

#[cfg(test)]
mod tests;
