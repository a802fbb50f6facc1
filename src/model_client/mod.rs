//! ModelClient - Model Endpoint adapter
//!
//! ## Responsibilities
//!
//! - POST a sensor payload verbatim to a category's model endpoint
//! - Bounded timeout, no retry
//! - Pass the downstream status through untouched
//! - Never fail because the downstream body is not JSON

use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;

/// Default forwarding timeout
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(60);

/// Downstream reply
#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    /// Downstream HTTP status
    pub status: u16,
    /// Parsed body, or `{"text": <raw body>}` when the body is not JSON
    pub body: Value,
}

/// HTTP client for model endpoints
#[derive(Clone)]
pub struct ModelClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl ModelClient {
    /// Create client with the default timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_FORWARD_TIMEOUT)
    }

    /// Create client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Forward `payload` to `endpoint`
    pub async fn forward(&self, endpoint: &str, payload: &Value) -> Result<ModelReply> {
        let forward_error = |e: reqwest::Error| Error::Forward {
            endpoint: endpoint.to_string(),
            detail: e.to_string(),
        };

        let resp = self
            .client
            .post(endpoint)
            .json(payload)
            .send()
            .await
            .map_err(forward_error)?;

        let status = resp.status().as_u16();
        let text = resp.text().await.map_err(forward_error)?;

        Ok(ModelReply {
            status,
            body: parse_body(text),
        })
    }

    /// Get timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// JSON body, or the raw text wrapped as `{"text": ...}`
fn parse_body(text: String) -> Value {
    match serde_json::from_str::<Value>(&text) {
        Ok(value) => value,
        Err(_) => json!({ "text": text }),
    }
}
