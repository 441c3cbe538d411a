//! Secondary-axis views: resolving "this node, restricted to one language"
//! for every tree node, falling back to placeholders so that callers never
//! branch on presence.

use std::sync::Arc;

use crate::engine::{NodeRef, NodeStats, StatsEngine};
use crate::error::Result;
use crate::keys::{LanguageId, NodeKey};
use crate::nodes::placeholder::Placeholder;
use crate::source::LanguageScope;

pub(crate) async fn single_language_stats(
    engine: &StatsEngine,
    node: &Arc<NodeStats>,
    language: &LanguageId,
) -> Result<Arc<NodeStats>> {
    let NodeRef::Tree(key) = &node.kind else {
        // A placeholder stands in for any language it is asked about.
        return Ok(node.clone());
    };
    let source = engine.source();
    Ok(match key {
        NodeKey::Global => {
            if source
                .languages_with_translations()
                .await?
                .contains(language)
            {
                engine.node(NodeKey::Language(language.clone()))
            } else {
                engine.placeholder(Placeholder::for_language(language.clone()))
            }
        }
        NodeKey::Project(id) => {
            let present = !source
                .scope_language_translations(LanguageScope::Project(*id), language)
                .await?
                .is_empty();
            if present {
                engine.node(NodeKey::ProjectLanguage(*id, language.clone()))
            } else {
                engine.placeholder(Placeholder::for_language(language.clone()))
            }
        }
        NodeKey::Category(id) => {
            let present = !source
                .scope_language_translations(LanguageScope::Category(*id), language)
                .await?
                .is_empty();
            if present {
                engine.node(NodeKey::CategoryLanguage(*id, language.clone()))
            } else {
                engine.placeholder(Placeholder::for_language(language.clone()))
            }
        }
        NodeKey::Component(id) => {
            let mut found = None;
            for translation in source.component_translations(*id).await? {
                if source.translation_scope(translation).await?.language == *language {
                    found = Some(translation);
                    break;
                }
            }
            match found {
                Some(translation) => engine.node(NodeKey::Translation(translation)),
                // "This language could be added here, with N strings to
                // translate": mirror the source strings as todo.
                None => {
                    let baseline = match source.source_translation(*id).await? {
                        Some(translation) => NodeKey::Translation(translation),
                        None => NodeKey::Component(*id),
                    };
                    engine.placeholder(Placeholder::missing_translation(
                        *id,
                        baseline,
                        language.clone(),
                    ))
                }
            }
        }
        NodeKey::Translation(id) => {
            if source.translation_scope(*id).await?.language == *language {
                node.clone()
            } else {
                engine.placeholder(Placeholder::for_language(language.clone()))
            }
        }
        NodeKey::Language(this) => same_or_placeholder(engine, node, this, language),
        NodeKey::ProjectLanguage(_, this) => same_or_placeholder(engine, node, this, language),
        NodeKey::CategoryLanguage(_, this) => same_or_placeholder(engine, node, this, language),
        // Component lists have no language axis of their own.
        NodeKey::ComponentList(_) => {
            engine.placeholder(Placeholder::for_language(language.clone()))
        }
    })
}

fn same_or_placeholder(
    engine: &StatsEngine,
    node: &Arc<NodeStats>,
    this: &LanguageId,
    requested: &LanguageId,
) -> Arc<NodeStats> {
    if this == requested {
        node.clone()
    } else {
        engine.placeholder(Placeholder::for_language(requested.clone()))
    }
}
