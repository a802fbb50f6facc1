//! DurableBacking - persisted key-value slots
//!
//! ## Responsibilities
//!
//! - Hold the active category and alert flags across process restarts
//! - Hide the storage medium behind one async trait
//!
//! Two implementations ship: [`FileBacking`] (one file per key) and
//! [`MemoryBacking`] (process-local, shared between clones).

mod file;
mod memory;

pub use file::FileBacking;
pub use memory::MemoryBacking;

use crate::error::Result;
use async_trait::async_trait;

/// Key holding the active category string
pub const ACTIVE_CATEGORY_KEY: &str = "active_category";

/// Persisted key-value slots
#[async_trait]
pub trait DurableBacking: Send + Sync {
    /// Read a value. Absent and empty records both yield `None`.
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Write a value. Returns only once the value is durable.
    async fn store(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}
