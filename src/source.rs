//! Queryable raw-content collaborator.
//!
//! The only place statistics meet actual translation content. The engine
//! never touches strings, checks or suggestions directly; it sees the
//! per-unit snapshots and aggregate queries exposed here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StatsError};
use crate::keys::{
    CategoryId, ComponentId, ComponentListId, LanguageId, ProjectId, TranslationId,
};

// ============================================================================
// Content snapshot types
// ============================================================================

/// Ordered translation state of one unit. `ReadOnly` is deliberately not a
/// state: it is an independent flag on [`UnitSnapshot`] and may co-occur
/// with any state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitState {
    #[default]
    Empty,
    Fuzzy,
    Translated,
    Approved,
}

/// Per-unit view the leaf computation consumes in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitSnapshot {
    pub state: UnitState,
    pub read_only: bool,
    pub words: u32,
    /// Source string length.
    pub chars: u32,
    /// Names of active (non-dismissed) failing checks.
    pub active_checks: Vec<String>,
    pub dismissed_checks: u32,
    /// Open suggestions.
    pub suggestions: u32,
    pub unresolved_comments: u32,
    pub labels: Vec<String>,
}

/// Most recent change of a translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub author: String,
}

/// Time-window aggregate over a translation's change history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub total: i64,
    pub recent: i64,
    pub monthly: i64,
}

/// One row of a grouped check or label breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakdownRow {
    pub name: String,
    pub strings: i64,
    pub words: i64,
    pub chars: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationScope {
    pub component: ComponentId,
    pub language: LanguageId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentScope {
    pub project: ProjectId,
    pub category: Option<CategoryId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryScope {
    pub project: ProjectId,
    pub parent: Option<CategoryId>,
}

/// Owning scope of a secondary-axis view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageScope {
    Project(ProjectId),
    Category(CategoryId),
}

// ============================================================================
// ContentSource trait
// ============================================================================

/// Raw content and entity relations, as far as statistics need them.
#[async_trait]
pub trait ContentSource: Send + Sync {
    // --- Entity tree ---

    async fn projects(&self) -> Result<Vec<ProjectId>>;

    /// Top-level categories of a project.
    async fn project_root_categories(&self, project: ProjectId) -> Result<Vec<CategoryId>>;

    /// Components directly in a project, outside any category.
    async fn project_root_components(&self, project: ProjectId) -> Result<Vec<ComponentId>>;

    async fn category_categories(&self, category: CategoryId) -> Result<Vec<CategoryId>>;

    async fn category_components(&self, category: CategoryId) -> Result<Vec<ComponentId>>;

    async fn category_scope(&self, category: CategoryId) -> Result<CategoryScope>;

    async fn component_scope(&self, component: ComponentId) -> Result<ComponentScope>;

    async fn component_translations(&self, component: ComponentId) -> Result<Vec<TranslationId>>;

    /// The translation holding the component's source strings, if any.
    async fn source_translation(&self, component: ComponentId) -> Result<Option<TranslationId>>;

    /// Component lists a component belongs to.
    async fn component_lists_with(&self, component: ComponentId) -> Result<Vec<ComponentListId>>;

    async fn component_list_members(&self, list: ComponentListId) -> Result<Vec<ComponentId>>;

    async fn translation_scope(&self, translation: TranslationId) -> Result<TranslationScope>;

    // --- Language axis ---

    /// All translations of one language, across all projects.
    async fn language_translations(&self, language: LanguageId) -> Result<Vec<TranslationId>>;

    /// Translations of one language within a project or category scope.
    /// Category scopes include nested categories; project scopes include
    /// components shared into the project from elsewhere.
    async fn scope_language_translations(
        &self,
        scope: LanguageScope,
        language: &LanguageId,
    ) -> Result<Vec<TranslationId>>;

    /// Distinct languages among a project's own translations.
    async fn project_languages(&self, project: ProjectId) -> Result<Vec<LanguageId>>;

    /// Distinct languages having any translation at all.
    async fn languages_with_translations(&self) -> Result<Vec<LanguageId>>;

    // --- Raw content ---

    async fn unit_stats(&self, translation: TranslationId) -> Result<Vec<UnitSnapshot>>;

    /// Grouped per-check-name measures over a translation's units.
    async fn check_stats(&self, translation: TranslationId) -> Result<Vec<BreakdownRow>>;

    /// Grouped per-label-name measures over a translation's units.
    async fn label_stats(&self, translation: TranslationId) -> Result<Vec<BreakdownRow>>;

    /// Global registry of check names, for zero-filling.
    async fn known_checks(&self) -> Result<Vec<String>>;

    /// Labels defined by a project, for zero-filling.
    async fn project_labels(&self, project: ProjectId) -> Result<Vec<String>>;

    // --- Change history ---

    async fn last_change(&self, translation: TranslationId) -> Result<Option<ChangeRecord>>;

    /// Total change count plus counts after the two window cutoffs.
    async fn change_counts(
        &self,
        translation: TranslationId,
        recent_after: DateTime<Utc>,
        monthly_after: DateTime<Utc>,
    ) -> Result<ChangeCounts>;

    // --- Workflow flags ---

    async fn project_has_review(&self, project: ProjectId) -> Result<bool>;

    async fn component_has_review(&self, component: ComponentId) -> Result<bool>;

    /// Source languages of a project, for the `is_source` pass-through.
    async fn source_languages(&self, project: ProjectId) -> Result<Vec<LanguageId>>;
}

// ============================================================================
// MemoryContentSource
// ============================================================================

struct ProjectEntry {
    review: bool,
    source_languages: Vec<LanguageId>,
}

struct CategoryEntry {
    project: ProjectId,
    parent: Option<CategoryId>,
}

struct ComponentEntry {
    project: ProjectId,
    category: Option<CategoryId>,
    review: bool,
    source_translation: Option<TranslationId>,
    shared_into: Vec<ProjectId>,
}

struct TranslationEntry {
    component: ComponentId,
    language: LanguageId,
    units: Vec<UnitSnapshot>,
    changes: Vec<ChangeRecord>,
}

/// In-memory content source with a mutable fixture surface, used by the
/// test suites and available to single-process embedders.
#[derive(Default)]
pub struct MemoryContentSource {
    projects: DashMap<ProjectId, ProjectEntry>,
    categories: DashMap<CategoryId, CategoryEntry>,
    components: DashMap<ComponentId, ComponentEntry>,
    translations: DashMap<TranslationId, TranslationEntry>,
    lists: DashMap<ComponentListId, Vec<ComponentId>>,
    labels: DashMap<ProjectId, Vec<String>>,
    checks: parking_lot::RwLock<Vec<String>>,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, id: ProjectId, review: bool, source_language: LanguageId) {
        self.projects.insert(
            id,
            ProjectEntry {
                review,
                source_languages: vec![source_language],
            },
        );
    }

    pub fn add_category(&self, id: CategoryId, project: ProjectId, parent: Option<CategoryId>) {
        self.categories.insert(id, CategoryEntry { project, parent });
    }

    pub fn add_component(
        &self,
        id: ComponentId,
        project: ProjectId,
        category: Option<CategoryId>,
        review: bool,
    ) {
        self.components.insert(
            id,
            ComponentEntry {
                project,
                category,
                review,
                source_translation: None,
                shared_into: Vec::new(),
            },
        );
    }

    /// Share a component into another project, as with cross-project
    /// sharing arrangements. It then contributes to that project's
    /// secondary-axis views.
    pub fn share_component(&self, id: ComponentId, into: ProjectId) {
        if let Some(mut entry) = self.components.get_mut(&id) {
            entry.shared_into.push(into);
        }
    }

    pub fn add_component_list(&self, id: ComponentListId, members: Vec<ComponentId>) {
        self.lists.insert(id, members);
    }

    pub fn add_translation(
        &self,
        id: TranslationId,
        component: ComponentId,
        language: LanguageId,
        units: Vec<UnitSnapshot>,
    ) {
        self.translations.insert(
            id,
            TranslationEntry {
                component,
                language,
                units,
                changes: Vec::new(),
            },
        );
    }

    pub fn set_source_translation(&self, component: ComponentId, translation: TranslationId) {
        if let Some(mut entry) = self.components.get_mut(&component) {
            entry.source_translation = Some(translation);
        }
    }

    pub fn set_units(&self, translation: TranslationId, units: Vec<UnitSnapshot>) {
        if let Some(mut entry) = self.translations.get_mut(&translation) {
            entry.units = units;
        }
    }

    pub fn record_change(&self, translation: TranslationId, change: ChangeRecord) {
        if let Some(mut entry) = self.translations.get_mut(&translation) {
            entry.changes.push(change);
        }
    }

    pub fn register_check(&self, name: impl Into<String>) {
        self.checks.write().push(name.into());
    }

    pub fn add_label(&self, project: ProjectId, name: impl Into<String>) {
        self.labels.entry(project).or_default().push(name.into());
    }

    /// Categories in the subtree rooted at `root`, root included.
    fn category_subtree(&self, root: CategoryId) -> Vec<CategoryId> {
        let mut subtree = vec![root];
        let mut frontier = vec![root];
        while let Some(current) = frontier.pop() {
            for entry in self.categories.iter() {
                if entry.value().parent == Some(current) {
                    subtree.push(*entry.key());
                    frontier.push(*entry.key());
                }
            }
        }
        subtree
    }

    fn components_in_scope(&self, scope: LanguageScope) -> Vec<ComponentId> {
        match scope {
            LanguageScope::Project(project) => self
                .components
                .iter()
                .filter(|entry| {
                    entry.value().project == project
                        || entry.value().shared_into.contains(&project)
                })
                .map(|entry| *entry.key())
                .collect(),
            LanguageScope::Category(category) => {
                let subtree = self.category_subtree(category);
                self.components
                    .iter()
                    .filter(|entry| {
                        entry
                            .value()
                            .category
                            .is_some_and(|c| subtree.contains(&c))
                    })
                    .map(|entry| *entry.key())
                    .collect()
            }
        }
    }

    fn breakdown<F>(&self, translation: TranslationId, names_of: F) -> Result<Vec<BreakdownRow>>
    where
        F: Fn(&UnitSnapshot) -> &[String],
    {
        let entry = self
            .translations
            .get(&translation)
            .ok_or_else(|| StatsError::missing("translation", translation))?;
        let mut rows: std::collections::BTreeMap<String, BreakdownRow> = Default::default();
        for unit in &entry.units {
            for name in names_of(unit) {
                let row = rows.entry(name.clone()).or_insert_with(|| BreakdownRow {
                    name: name.clone(),
                    strings: 0,
                    words: 0,
                    chars: 0,
                });
                row.strings += 1;
                row.words += unit.words as i64;
                row.chars += unit.chars as i64;
            }
        }
        Ok(rows.into_values().collect())
    }
}

#[async_trait]
impl ContentSource for MemoryContentSource {
    async fn projects(&self) -> Result<Vec<ProjectId>> {
        let mut ids: Vec<_> = self.projects.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        Ok(ids)
    }

    async fn project_root_categories(&self, project: ProjectId) -> Result<Vec<CategoryId>> {
        let mut ids: Vec<_> = self
            .categories
            .iter()
            .filter(|entry| entry.value().project == project && entry.value().parent.is_none())
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn project_root_components(&self, project: ProjectId) -> Result<Vec<ComponentId>> {
        let mut ids: Vec<_> = self
            .components
            .iter()
            .filter(|entry| entry.value().project == project && entry.value().category.is_none())
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn category_categories(&self, category: CategoryId) -> Result<Vec<CategoryId>> {
        let mut ids: Vec<_> = self
            .categories
            .iter()
            .filter(|entry| entry.value().parent == Some(category))
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn category_components(&self, category: CategoryId) -> Result<Vec<ComponentId>> {
        let mut ids: Vec<_> = self
            .components
            .iter()
            .filter(|entry| entry.value().category == Some(category))
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn category_scope(&self, category: CategoryId) -> Result<CategoryScope> {
        let entry = self
            .categories
            .get(&category)
            .ok_or_else(|| StatsError::missing("category", category))?;
        Ok(CategoryScope {
            project: entry.project,
            parent: entry.parent,
        })
    }

    async fn component_scope(&self, component: ComponentId) -> Result<ComponentScope> {
        let entry = self
            .components
            .get(&component)
            .ok_or_else(|| StatsError::missing("component", component))?;
        Ok(ComponentScope {
            project: entry.project,
            category: entry.category,
        })
    }

    async fn component_translations(&self, component: ComponentId) -> Result<Vec<TranslationId>> {
        if !self.components.contains_key(&component) {
            return Err(StatsError::missing("component", component));
        }
        let mut ids: Vec<_> = self
            .translations
            .iter()
            .filter(|entry| entry.value().component == component)
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn source_translation(&self, component: ComponentId) -> Result<Option<TranslationId>> {
        let entry = self
            .components
            .get(&component)
            .ok_or_else(|| StatsError::missing("component", component))?;
        Ok(entry.source_translation)
    }

    async fn component_lists_with(&self, component: ComponentId) -> Result<Vec<ComponentListId>> {
        let mut ids: Vec<_> = self
            .lists
            .iter()
            .filter(|entry| entry.value().contains(&component))
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn component_list_members(&self, list: ComponentListId) -> Result<Vec<ComponentId>> {
        self.lists
            .get(&list)
            .map(|entry| entry.clone())
            .ok_or_else(|| StatsError::missing("component list", list))
    }

    async fn translation_scope(&self, translation: TranslationId) -> Result<TranslationScope> {
        let entry = self
            .translations
            .get(&translation)
            .ok_or_else(|| StatsError::missing("translation", translation))?;
        Ok(TranslationScope {
            component: entry.component,
            language: entry.language.clone(),
        })
    }

    async fn language_translations(&self, language: LanguageId) -> Result<Vec<TranslationId>> {
        let mut ids: Vec<_> = self
            .translations
            .iter()
            .filter(|entry| entry.value().language == language)
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn scope_language_translations(
        &self,
        scope: LanguageScope,
        language: &LanguageId,
    ) -> Result<Vec<TranslationId>> {
        let components = self.components_in_scope(scope);
        let mut ids: Vec<_> = self
            .translations
            .iter()
            .filter(|entry| {
                entry.value().language == *language
                    && components.contains(&entry.value().component)
            })
            .map(|entry| *entry.key())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn project_languages(&self, project: ProjectId) -> Result<Vec<LanguageId>> {
        let mut languages: Vec<_> = self
            .translations
            .iter()
            .filter(|entry| {
                self.components
                    .get(&entry.value().component)
                    .is_some_and(|c| c.project == project)
            })
            .map(|entry| entry.value().language.clone())
            .collect();
        languages.sort();
        languages.dedup();
        Ok(languages)
    }

    async fn languages_with_translations(&self) -> Result<Vec<LanguageId>> {
        let mut languages: Vec<_> = self
            .translations
            .iter()
            .map(|entry| entry.value().language.clone())
            .collect();
        languages.sort();
        languages.dedup();
        Ok(languages)
    }

    async fn unit_stats(&self, translation: TranslationId) -> Result<Vec<UnitSnapshot>> {
        let entry = self
            .translations
            .get(&translation)
            .ok_or_else(|| StatsError::missing("translation", translation))?;
        Ok(entry.units.clone())
    }

    async fn check_stats(&self, translation: TranslationId) -> Result<Vec<BreakdownRow>> {
        self.breakdown(translation, |unit| &unit.active_checks)
    }

    async fn label_stats(&self, translation: TranslationId) -> Result<Vec<BreakdownRow>> {
        self.breakdown(translation, |unit| &unit.labels)
    }

    async fn known_checks(&self) -> Result<Vec<String>> {
        Ok(self.checks.read().clone())
    }

    async fn project_labels(&self, project: ProjectId) -> Result<Vec<String>> {
        Ok(self
            .labels
            .get(&project)
            .map(|entry| entry.clone())
            .unwrap_or_default())
    }

    async fn last_change(&self, translation: TranslationId) -> Result<Option<ChangeRecord>> {
        let entry = self
            .translations
            .get(&translation)
            .ok_or_else(|| StatsError::missing("translation", translation))?;
        Ok(entry
            .changes
            .iter()
            .max_by_key(|change| change.timestamp)
            .cloned())
    }

    async fn change_counts(
        &self,
        translation: TranslationId,
        recent_after: DateTime<Utc>,
        monthly_after: DateTime<Utc>,
    ) -> Result<ChangeCounts> {
        let entry = self
            .translations
            .get(&translation)
            .ok_or_else(|| StatsError::missing("translation", translation))?;
        let mut counts = ChangeCounts::default();
        for change in &entry.changes {
            counts.total += 1;
            if change.timestamp > recent_after {
                counts.recent += 1;
            }
            if change.timestamp > monthly_after {
                counts.monthly += 1;
            }
        }
        Ok(counts)
    }

    async fn project_has_review(&self, project: ProjectId) -> Result<bool> {
        let entry = self
            .projects
            .get(&project)
            .ok_or_else(|| StatsError::missing("project", project))?;
        Ok(entry.review)
    }

    async fn component_has_review(&self, component: ComponentId) -> Result<bool> {
        let entry = self
            .components
            .get(&component)
            .ok_or_else(|| StatsError::missing("component", component))?;
        Ok(entry.review)
    }

    async fn source_languages(&self, project: ProjectId) -> Result<Vec<LanguageId>> {
        let entry = self
            .projects
            .get(&project)
            .ok_or_else(|| StatsError::missing("project", project))?;
        Ok(entry.source_languages.clone())
    }
}
