//! Category Router Types

use crate::category_store::Category;
use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Reference model endpoints
pub const REFERENCE_ENDPOINTS: [(&str, &str); 3] = [
    (
        "fruit",
        "https://fruit-shelflife-hab9a5engxa3hsdv.eastus2-01.azurewebsites.net/predict",
    ),
    (
        "meat",
        "https://shelflife-e3cmc8asfjh9hph4.eastus2-01.azurewebsites.net/predict",
    ),
    (
        "dairy",
        "https://ds-shelf-life-dkdxfgbeebahh4ad.eastus2-01.azurewebsites.net/predict",
    ),
];

/// Static category -> model endpoint URL mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointMap {
    endpoints: BTreeMap<Category, String>,
}

impl EndpointMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapping from `(category, url)` pairs; category names are normalized
    pub fn from_pairs<I, C, U>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, U)>,
        C: AsRef<str>,
        U: Into<String>,
    {
        let mut map = Self::new();
        for (category, url) in pairs {
            map.insert(Category::parse(category.as_ref())?, url);
        }
        Ok(map)
    }

    /// Parse `name=url` pairs separated by commas
    pub fn parse(raw: &str) -> Result<Self> {
        let mut map = Self::new();

        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, url) = entry.split_once('=').ok_or_else(|| {
                Error::Config(format!("Endpoint entry '{}' is not name=url", entry))
            })?;

            let url = url.trim();
            if url.is_empty() {
                return Err(Error::Config(format!(
                    "Endpoint entry '{}' has no URL",
                    entry
                )));
            }

            let category = Category::parse(name)
                .map_err(|_| Error::Config(format!("Endpoint entry '{}' has no name", entry)))?;
            map.insert(category, url);
        }

        Ok(map)
    }

    /// The reference fruit/meat/dairy endpoints
    pub fn reference() -> Self {
        let endpoints = REFERENCE_ENDPOINTS
            .iter()
            .filter_map(|(name, url)| Category::parse(name).ok().map(|c| (c, url.to_string())))
            .collect();
        Self { endpoints }
    }

    pub fn insert(&mut self, category: Category, url: impl Into<String>) {
        self.endpoints.insert(category, url.into());
    }

    pub fn get(&self, category: &Category) -> Option<&str> {
        self.endpoints.get(category).map(String::as_str)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.endpoints.keys()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// When spoilage alerts are re-armed automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertResetPolicy {
    /// Re-arm when a forwarded result no longer reads as spoiled
    pub on_clear: bool,
    /// Re-arm the outgoing category's alerts when the active category changes
    pub on_category_change: bool,
}

impl Default for AlertResetPolicy {
    fn default() -> Self {
        Self {
            on_clear: true,
            on_category_change: true,
        }
    }
}

/// Result of `set_category`
#[derive(Debug, Clone)]
pub struct SetOutcome {
    pub category: Category,
    pub changed: bool,
    /// False when the new value only lives in memory
    pub persisted: bool,
}

/// Result of `forward`
#[derive(Debug, Clone)]
pub struct ForwardOutcome {
    pub category: Category,
    /// Downstream status, passed through
    pub status: u16,
    /// Downstream body
    pub body: Value,
    pub spoiled: bool,
    /// A spoilage notification was dispatched for this result
    pub alert_dispatched: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoint_list() {
        let map = EndpointMap::parse(" Fruit=http://a/predict , meat = http://b/predict,,").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&Category::parse("fruit").unwrap()),
            Some("http://a/predict")
        );
        assert_eq!(
            map.get(&Category::parse("meat").unwrap()),
            Some("http://b/predict")
        );
        assert_eq!(map.get(&Category::parse("dairy").unwrap()), None);
    }

    #[test]
    fn test_parse_rejects_malformed_entries() {
        assert!(matches!(EndpointMap::parse("fruit"), Err(Error::Config(_))));
        assert!(matches!(EndpointMap::parse("fruit="), Err(Error::Config(_))));
        assert!(matches!(EndpointMap::parse("=http://a"), Err(Error::Config(_))));
        assert!(EndpointMap::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_reference_endpoints() {
        let map = EndpointMap::reference();
        let names: Vec<&str> = map.categories().map(Category::as_str).collect();
        assert_eq!(names, vec!["dairy", "fruit", "meat"]);
    }

    #[test]
    fn test_from_pairs_normalizes() {
        let map = EndpointMap::from_pairs([(" FRUIT ", "http://e1")]).unwrap();
        assert_eq!(map.get(&Category::parse("fruit").unwrap()), Some("http://e1"));
    }
}
