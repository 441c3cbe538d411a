//! Node identities, cache keys and the basic metric-key sets.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

// ============================================================================
// Entity identifiers
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TranslationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentListId(pub u64);

/// Language code, e.g. `cs` or `pt_BR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LanguageId(pub String);

impl LanguageId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TranslationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ComponentListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// NodeKey - identity of a statistics node
// ============================================================================

/// Identity of one statistics node in the entity tree.
///
/// Serializable so that it can double as the payload of a deferred refresh
/// job; a worker reconstructs the node from the key instead of capturing a
/// live object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    /// Singleton root aggregating all projects.
    Global,
    Project(ProjectId),
    Category(CategoryId),
    Component(ComponentId),
    /// Leaf: one component in one language.
    Translation(TranslationId),
    /// Arbitrary component grouping, orthogonal to the project tree.
    ComponentList(ComponentListId),
    /// All translations of one language across all projects.
    Language(LanguageId),
    /// Secondary axis: one project restricted to one language.
    ProjectLanguage(ProjectId, LanguageId),
    /// Secondary axis: one category restricted to one language.
    CategoryLanguage(CategoryId, LanguageId),
}

impl NodeKey {
    /// Cache slot for this node's persisted record.
    pub fn cache_key(&self) -> String {
        match self {
            NodeKey::Global => "stats-global".to_string(),
            NodeKey::Project(id) => format!("stats-project-{id}"),
            NodeKey::Category(id) => format!("stats-category-{id}"),
            NodeKey::Component(id) => format!("stats-component-{id}"),
            NodeKey::Translation(id) => format!("stats-translation-{id}"),
            NodeKey::ComponentList(id) => format!("stats-component-list-{id}"),
            NodeKey::Language(id) => format!("stats-language-{id}"),
            NodeKey::ProjectLanguage(id, lang) => format!("stats-project-{id}-lang-{lang}"),
            NodeKey::CategoryLanguage(id, lang) => format!("stats-category-{id}-lang-{lang}"),
        }
    }

    /// Whether this node computes directly from raw content.
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeKey::Translation(_))
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

/// Cache slot for the last-change pointer of a translation leaf.
pub fn last_change_key(id: TranslationId) -> String {
    format!("last-change-{id}")
}

// ============================================================================
// Basic metric-key sets
// ============================================================================

/// The partitions carrying a count plus `_words`/`_chars` sums.
pub const BASIC_PARTITIONS: [&str; 16] = [
    "all",
    "fuzzy",
    "todo",
    "readonly",
    "nottranslated",
    "translated",
    "approved",
    "unapproved",
    "unlabeled",
    "allchecks",
    "translated_checks",
    "dismissed_checks",
    "suggestions",
    "nosuggestions",
    "approved_suggestions",
    "comments",
];

const EXTRA_KEYS: [&str; 6] = [
    "languages",
    "last_changed",
    "last_author",
    "recent_changes",
    "monthly_changes",
    "total_changes",
];

const SOURCE_ONLY_KEYS: [&str; 3] = ["source_strings", "source_words", "source_chars"];

static BASIC_KEYS: OnceLock<BTreeSet<String>> = OnceLock::new();
static SOURCE_KEYS: OnceLock<BTreeSet<String>> = OnceLock::new();
static SOURCE_MEASURES: OnceLock<Vec<String>> = OnceLock::new();

fn build_basic_keys() -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for partition in BASIC_PARTITIONS {
        keys.insert(partition.to_string());
        keys.insert(format!("{partition}_words"));
        keys.insert(format!("{partition}_chars"));
    }
    for extra in EXTRA_KEYS {
        keys.insert(extra.to_string());
    }
    keys
}

/// The complete persisted key set of a translation leaf.
pub fn basic_keys() -> &'static BTreeSet<String> {
    BASIC_KEYS.get_or_init(build_basic_keys)
}

/// The complete persisted key set of a composite node: the basic keys plus
/// the `source_*` measures.
pub fn source_keys() -> &'static BTreeSet<String> {
    SOURCE_KEYS.get_or_init(|| {
        let mut keys = build_basic_keys();
        for key in SOURCE_ONLY_KEYS {
            keys.insert(key.to_string());
        }
        keys
    })
}

/// Just the three `source_*` measures.
pub fn source_measure_keys() -> &'static [String] {
    SOURCE_MEASURES.get_or_init(|| SOURCE_ONLY_KEYS.iter().map(|key| key.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_keys_are_stable() {
        assert_eq!(NodeKey::Global.cache_key(), "stats-global");
        assert_eq!(
            NodeKey::Project(ProjectId(7)).cache_key(),
            "stats-project-7"
        );
        assert_eq!(
            NodeKey::Translation(TranslationId(42)).cache_key(),
            "stats-translation-42"
        );
        assert_eq!(
            NodeKey::ProjectLanguage(ProjectId(3), LanguageId::new("cs")).cache_key(),
            "stats-project-3-lang-cs"
        );
        assert_eq!(
            NodeKey::CategoryLanguage(CategoryId(9), LanguageId::new("de")).cache_key(),
            "stats-category-9-lang-de"
        );
        assert_eq!(last_change_key(TranslationId(42)), "last-change-42");
    }

    #[test]
    fn key_set_sizes() {
        // 16 partitions x (count, words, chars) + 6 extras.
        assert_eq!(basic_keys().len(), 16 * 3 + 6);
        assert_eq!(source_keys().len(), 16 * 3 + 6 + 3);
        assert!(basic_keys().contains("translated_words"));
        assert!(!basic_keys().contains("source_strings"));
        assert!(source_keys().contains("source_strings"));
    }
}
