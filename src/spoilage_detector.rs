//! Spoilage Detector
//!
//! Keyword heuristic over a model result. Classification belongs to the
//! downstream model; this only decides whether a result reads as spoiled.

use serde_json::Value;

/// Default keywords
pub const DEFAULT_KEYWORDS: [&str; 2] = ["spoil", "bad"];

/// Case-insensitive substring matcher over stringified results
#[derive(Debug, Clone)]
pub struct SpoilageDetector {
    keywords: Vec<String>,
}

impl SpoilageDetector {
    /// Build from keywords; blanks are dropped and the rest lowercased
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Whether the result contains any keyword
    pub fn is_spoiled(&self, result: &Value) -> bool {
        let text = match result {
            Value::String(s) => s.to_lowercase(),
            other => other.to_string().to_lowercase(),
        };
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }
}

impl Default for SpoilageDetector {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORDS)
    }
}
