//! Alert Deduplicator Types

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of alert tracked per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Downstream model reported spoilage
    Spoiled,
}

impl AlertKind {
    pub const ALL: [AlertKind; 1] = [AlertKind::Spoiled];

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Spoiled => "spoiled",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "spoiled" => Ok(AlertKind::Spoiled),
            other => Err(Error::Validation(format!("Unknown alert kind '{}'", other))),
        }
    }
}

/// Per (category, kind) alert state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    /// Next matching condition triggers a notification
    #[default]
    Armed,
    /// Notification already sent for the current condition
    Sent,
}

/// Durable form of a `Sent` flag
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub state: AlertState,
    pub sent_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn sent_now() -> Self {
        Self {
            state: AlertState::Sent,
            sent_at: Utc::now(),
        }
    }

    /// Decode a stored flag. The bare legacy marker `sent` is accepted too.
    pub fn decode(raw: &str) -> Result<AlertState> {
        if raw.trim().eq_ignore_ascii_case("sent") {
            return Ok(AlertState::Sent);
        }
        let record: AlertRecord = serde_json::from_str(raw)?;
        Ok(record.state)
    }
}
