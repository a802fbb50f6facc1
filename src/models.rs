//! Shared response models

use crate::alert_dedup::{AlertKind, AlertState};
use crate::category_store::Category;
use serde::{Deserialize, Serialize};

/// `{category}` body of the category endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub category: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            category: category.into(),
        }
    }
}

/// Manual alert reset request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResetAlertRequest {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Manual alert reset response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetAlertResponse {
    pub category: String,
    pub kind: AlertKind,
    pub state: AlertState,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_category: Option<String>,
    pub categories: Vec<String>,
}
