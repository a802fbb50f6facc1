//! In-process durable slots
//!
//! Survives rebuilding every component on top of it, not a process exit.
//! Clones share the same map.

use super::DurableBacking;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared in-memory backing
#[derive(Clone, Default)]
pub struct MemoryBacking {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryBacking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DurableBacking for MemoryBacking {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .records
            .read()
            .await
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    async fn store(&self, key: &str, value: &str) -> Result<()> {
        self.records
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.records.write().await.remove(key);
        Ok(())
    }
}
