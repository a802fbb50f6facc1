//! CategoryStore - Durable Active Category
//!
//! ## Responsibilities
//!
//! - Own the single process-wide active category
//! - Two tiers: in-process cache in front of a durable backing record
//! - Serialize compare-and-persist so exactly one caller observes a transition
//! - Reconcile the cache with out-of-band changes to the backing record
//!
//! ## Durability
//!
//! A write is committed once the backing accepts it. If the backing write
//! fails the cache still takes the new value (weak durability) and the
//! failure is returned to the caller. Until a later write succeeds the cache
//! is marked unpersisted, and `refresh` retries the write instead of
//! adopting the stale backing record.

mod types;

pub use types::*;

use crate::durable_backing::{DurableBacking, ACTIVE_CATEGORY_KEY};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cached view of the active category
#[derive(Debug, Default)]
struct CacheState {
    value: Option<Category>,
    /// Cache holds a value the backing has not accepted yet
    unpersisted: bool,
}

/// Durable category store
pub struct CategoryStore {
    backing: Arc<dyn DurableBacking>,
    cache: RwLock<CacheState>,
}

impl CategoryStore {
    /// Create a store with a cold cache. The backing is read on first `get`.
    pub fn new(backing: Arc<dyn DurableBacking>) -> Self {
        Self {
            backing,
            cache: RwLock::new(CacheState::default()),
        }
    }

    /// Create a store and warm the cache from the backing record.
    ///
    /// When the backing holds nothing and `seed` is given, the seed becomes
    /// the active category and is persisted.
    pub async fn load(backing: Arc<dyn DurableBacking>, seed: Option<Category>) -> Self {
        let store = Self::new(backing);

        match store.read_backing().await {
            Ok(Some(category)) => {
                tracing::info!(category = %category, "Loaded saved category");
                store.cache.write().await.value = Some(category);
            }
            Ok(None) => {
                if let Some(seed) = seed {
                    tracing::info!(category = %seed, "Seeding category from configuration");
                    store.set(seed).await;
                } else {
                    tracing::info!("No saved category, starting unset");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read persisted category, starting unset");
                if let Some(seed) = seed {
                    store.set(seed).await;
                }
            }
        }

        store
    }

    /// Current category, reloading from the backing when the cache is empty.
    ///
    /// `Ok(None)` means unset; a failed backing read is an error, not unset.
    pub async fn get(&self) -> Result<Option<Category>> {
        if let Some(category) = self.cache.read().await.value.clone() {
            return Ok(Some(category));
        }

        let Some(stored) = self.read_backing().await? else {
            return Ok(None);
        };

        let mut cache = self.cache.write().await;
        // A concurrent set may have filled the cache meanwhile
        Ok(Some(cache.value.get_or_insert(stored).clone()))
    }

    /// Make `category` active and return the transition.
    ///
    /// Holds the write lock across compare and persist, so of several
    /// concurrent callers setting the same new value only one sees a change.
    pub async fn set(&self, category: Category) -> CategoryTransition {
        let mut cache = self.cache.write().await;

        let previous = match cache.value.clone() {
            Some(current) => Some(current),
            None => self.read_backing().await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not read persisted category");
                None
            }),
        };

        let needs_write = previous.as_ref() != Some(&category) || cache.unpersisted;
        let persist_error = if needs_write {
            match self.backing.store(ACTIVE_CATEGORY_KEY, category.as_str()).await {
                Ok(()) => {
                    tracing::debug!(category = %category, "Category persisted");
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        category = %category,
                        error = %e,
                        "Could not persist category, keeping it in memory only"
                    );
                    Some(e.to_string())
                }
            }
        } else {
            None
        };

        cache.value = Some(category.clone());
        cache.unpersisted = persist_error.is_some();

        CategoryTransition {
            previous,
            current: category,
            persist_error,
        }
    }

    /// Reconcile the cache with the backing record.
    ///
    /// Returns `true` when the cache adopted an out-of-band value.
    pub async fn refresh(&self) -> Result<bool> {
        {
            let cache = self.cache.read().await;
            if !cache.unpersisted {
                let stored = self.read_backing().await?;
                if stored.is_none() || stored == cache.value {
                    return Ok(false);
                }
            }
        }

        let mut cache = self.cache.write().await;

        if cache.unpersisted {
            if let Some(current) = cache.value.clone() {
                self.backing
                    .store(ACTIVE_CATEGORY_KEY, current.as_str())
                    .await?;
                cache.unpersisted = false;
                tracing::info!(category = %current, "Unpersisted category written to backing");
            }
            return Ok(false);
        }

        // Re-read under the lock; a set may have landed since the fast path
        match self.read_backing().await? {
            Some(stored) if cache.value.as_ref() != Some(&stored) => {
                tracing::info!(
                    previous = ?cache.value.as_ref().map(Category::as_str),
                    category = %stored,
                    "Category reloaded from backing"
                );
                cache.value = Some(stored);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Whether the cached value is known to be missing from the backing
    pub async fn is_unpersisted(&self) -> bool {
        self.cache.read().await.unpersisted
    }

    async fn read_backing(&self) -> Result<Option<Category>> {
        match self.backing.load(ACTIVE_CATEGORY_KEY).await? {
            Some(raw) => Ok(Some(Category::parse(&raw)?)),
            None => Ok(None),
        }
    }
}
