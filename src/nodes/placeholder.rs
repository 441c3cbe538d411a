//! Placeholder nodes: always-zero or todo-mirroring stand-ins for
//! hypothetical combinations. Never persisted; load and save are no-ops.

use crate::engine::StatsEngine;
use crate::error::Result;
use crate::keys::{ComponentId, LanguageId, NodeKey, ProjectId, source_keys};
use crate::record::StatsRecord;

/// Description of a nonexistent combination a placeholder stands in for.
#[derive(Debug, Clone, Default)]
pub struct Placeholder {
    /// Node whose `all/all_words/all_chars` seed this placeholder's `all*`
    /// and `todo*` (everything outstanding, nothing done).
    pub baseline: Option<NodeKey>,
    pub language: Option<LanguageId>,
    /// Owning component, for missing-translation placeholders.
    pub component: Option<ComponentId>,
    /// Owning project of a shared component, when the placeholder is
    /// listed under a project the component was shared into.
    pub is_shared: Option<ProjectId>,
}

impl Placeholder {
    /// All-zero placeholder with no identity.
    pub fn zero() -> Self {
        Self::default()
    }

    /// All-zero placeholder for a language absent from some scope.
    pub fn for_language(language: LanguageId) -> Self {
        Self {
            language: Some(language),
            ..Self::default()
        }
    }

    /// Placeholder for a language a component could be translated into,
    /// mirroring the given baseline (normally the component's source
    /// translation) as outstanding work.
    pub fn missing_translation(
        component: ComponentId,
        baseline: NodeKey,
        language: LanguageId,
    ) -> Self {
        Self {
            baseline: Some(baseline),
            language: Some(language),
            component: Some(component),
            is_shared: None,
        }
    }

    /// Seed from an arbitrary baseline node.
    pub fn with_baseline(baseline: NodeKey) -> Self {
        Self {
            baseline: Some(baseline),
            ..Self::default()
        }
    }

    pub fn shared_from(mut self, project: ProjectId) -> Self {
        self.is_shared = Some(project);
        self
    }
}

pub(crate) async fn compute_basic(
    engine: &StatsEngine,
    placeholder: &Placeholder,
) -> Result<StatsRecord> {
    let mut record = StatsRecord::zero(source_keys());
    if let Some(baseline) = &placeholder.baseline {
        let base = engine.basic_record(&engine.node(baseline.clone())).await?;
        for (target, source) in [
            ("all", "all"),
            ("all_words", "all_words"),
            ("all_chars", "all_chars"),
            ("todo", "all"),
            ("todo_words", "all_words"),
            ("todo_chars", "all_chars"),
        ] {
            record.store_count(target, base.count(source));
        }
    }
    Ok(record)
}
