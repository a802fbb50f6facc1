//! Category Store Types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized category identifier (trimmed, lowercase, non-empty)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    /// Normalize raw input into a category
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(Error::Validation("Category missing".to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Category with its first letter capitalised, for messages
    pub fn display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.0
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Outcome of a `set`: what was active before and what is active now
#[derive(Debug, Clone)]
pub struct CategoryTransition {
    pub previous: Option<Category>,
    pub current: Category,
    /// Durable write failure, if the new value only lives in memory
    pub persist_error: Option<String>,
}

impl CategoryTransition {
    /// Whether the active category actually changed
    pub fn changed(&self) -> bool {
        self.previous.as_ref() != Some(&self.current)
    }

    pub fn is_persisted(&self) -> bool {
        self.persist_error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(Category::parse(" Fruit ").unwrap().as_str(), "fruit");
        assert_eq!(Category::parse("MEAT\n").unwrap().as_str(), "meat");
        assert_eq!(
            Category::parse(" Fruit ").unwrap(),
            Category::parse("fruit").unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!(matches!(Category::parse(""), Err(Error::Validation(_))));
        assert!(matches!(Category::parse("  \t"), Err(Error::Validation(_))));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(Category::parse("dairy").unwrap().display_name(), "Dairy");
        assert_eq!(Category::parse("élan").unwrap().display_name(), "Élan");
    }

    #[test]
    fn test_serde_normalizes() {
        let c: Category = serde_json::from_str("\" Meat \"").unwrap();
        assert_eq!(c.as_str(), "meat");
        assert!(serde_json::from_str::<Category>("\"  \"").is_err());
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"meat\"");
    }

    #[test]
    fn test_transition_changed() {
        let fruit = Category::parse("fruit").unwrap();
        let first = CategoryTransition {
            previous: None,
            current: fruit.clone(),
            persist_error: None,
        };
        assert!(first.changed());

        let repeat = CategoryTransition {
            previous: Some(fruit.clone()),
            current: fruit,
            persist_error: Some("disk full".into()),
        };
        assert!(!repeat.changed());
        assert!(!repeat.is_persisted());
    }
}
