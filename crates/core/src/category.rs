//! Fixed category set and the closed label type the classifier resolves replies into.

use crate::config::{CategoryEntry, ConfigError};
use serde::{Serialize, Serializer};
use std::fmt;

/// Folder used whenever a file cannot be confidently classified.
pub const FALLBACK_CATEGORY: &str = "Other";

/// Ordered, validated category name → keyword guidance mapping. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySpec {
    entries: Vec<CategoryEntry>,
}

impl CategorySpec {
    pub fn new(entries: Vec<CategoryEntry>) -> Result<Self, ConfigError> {
        if entries.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        let mut cleaned: Vec<CategoryEntry> = Vec::with_capacity(entries.len());
        for entry in entries {
            let name = entry.name.trim().to_string();
            if name.is_empty() {
                return Err(ConfigError::EmptyCategoryName);
            }
            if name == "." || name == ".." || name.contains(['/', '\\']) {
                return Err(ConfigError::InvalidCategoryName(name));
            }
            if name.eq_ignore_ascii_case(FALLBACK_CATEGORY) {
                return Err(ConfigError::ReservedCategoryName(name));
            }
            if cleaned.iter().any(|c| c.name == name) {
                return Err(ConfigError::DuplicateCategory(name));
            }
            cleaned.push(CategoryEntry {
                name,
                keywords: entry.keywords.trim().to_string(),
            });
        }
        Ok(Self { entries: cleaned })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    /// Exact, case-sensitive lookup of a reply against the configured names.
    pub fn resolve(&self, label: &str) -> Category {
        self.entries
            .iter()
            .position(|e| e.name == label)
            .map(|index| Category::Configured {
                index,
                name: self.entries[index].name.clone(),
            })
            .unwrap_or(Category::Other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Configured { index: usize, name: String },
    /// The explicit "unclassified" variant, stored under [`FALLBACK_CATEGORY`].
    Other,
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Configured { name, .. } => name,
            Category::Other => FALLBACK_CATEGORY,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Category::Other)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_categories;

    #[test]
    fn resolve_is_exact_match_only() {
        let spec = CategorySpec::new(default_categories()).unwrap();
        assert_eq!(spec.resolve("Invoices").as_str(), "Invoices");
        assert_eq!(spec.resolve("invoices"), Category::Other);
        assert_eq!(spec.resolve("Invoices."), Category::Other);
        assert_eq!(spec.resolve(""), Category::Other);
        assert!(matches!(
            spec.resolve("Work"),
            Category::Configured { index: 5, .. }
        ));
    }

    #[test]
    fn names_are_trimmed_and_validated() {
        let spec = CategorySpec::new(vec![CategoryEntry::new("  Taxes ", " tax ")]).unwrap();
        assert_eq!(spec.names().collect::<Vec<_>>(), vec!["Taxes"]);
        assert_eq!(spec.entries()[0].keywords, "tax");

        assert!(matches!(
            CategorySpec::new(vec![]),
            Err(ConfigError::NoCategories)
        ));
        assert!(matches!(
            CategorySpec::new(vec![CategoryEntry::new(" ", "")]),
            Err(ConfigError::EmptyCategoryName)
        ));
        assert!(matches!(
            CategorySpec::new(vec![CategoryEntry::new("a/b", "")]),
            Err(ConfigError::InvalidCategoryName(_))
        ));
        assert!(matches!(
            CategorySpec::new(vec![CategoryEntry::new("..", "")]),
            Err(ConfigError::InvalidCategoryName(_))
        ));
        assert!(matches!(
            CategorySpec::new(vec![CategoryEntry::new("other", "")]),
            Err(ConfigError::ReservedCategoryName(_))
        ));
        assert!(matches!(
            CategorySpec::new(vec![CategoryEntry::new("A", ""), CategoryEntry::new("A ", "")]),
            Err(ConfigError::DuplicateCategory(_))
        ));
    }

    #[test]
    fn fallback_displays_as_other() {
        assert_eq!(Category::Other.to_string(), "Other");
        assert!(Category::Other.is_fallback());
        assert_eq!(
            serde_json::to_value(Category::Other).unwrap(),
            serde_json::json!("Other")
        );
    }
}
