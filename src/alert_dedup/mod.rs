//! AlertDeduplicator - at most one notification per alert onset
//!
//! ## State machine
//!
//! Armed --(condition observed, claim succeeds)--> Sent --(reset)--> Armed
//!
//! States are mirrored to the durable backing, so a `Sent` flag survives
//! restarts. Only pairs that were claimed are held in memory; others are read
//! from the backing on each access. Only the state check/update runs under
//! the lock; callers send notifications after releasing it.

mod types;

pub use types::*;

use crate::category_store::Category;
use crate::durable_backing::DurableBacking;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

type AlertKey = (Category, AlertKind);

/// Identifies one successful claim, so a failed send releases only its own claim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimId(u64);

/// Tracked state of one (category, kind) pair
#[derive(Debug, Clone, Copy)]
struct Slot {
    state: AlertState,
    /// Claim that produced the current `Sent` state, if made by this process
    claim: Option<ClaimId>,
}

#[derive(Default)]
struct Slots {
    entries: HashMap<AlertKey, Slot>,
    next_claim: u64,
}

/// Alert deduplicator
pub struct AlertDeduplicator {
    backing: Arc<dyn DurableBacking>,
    slots: Mutex<Slots>,
}

impl AlertDeduplicator {
    pub fn new(backing: Arc<dyn DurableBacking>) -> Self {
        Self {
            backing,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// Current state for (category, kind)
    pub async fn state(&self, category: &Category, kind: AlertKind) -> AlertState {
        let slots = self.slots.lock().await;
        self.lookup(&slots, category, kind).await
    }

    /// Read-only check; does not consume the armed state
    pub async fn is_armed(&self, category: &Category, kind: AlertKind) -> bool {
        self.state(category, kind).await == AlertState::Armed
    }

    /// Returns `true` exactly once per armed period, recording the alert as sent
    pub async fn should_alert(&self, category: &Category, kind: AlertKind) -> bool {
        self.claim(category, kind).await.is_some()
    }

    /// Atomic check-and-set. Yields a [`ClaimId`] once per armed period.
    pub async fn claim(&self, category: &Category, kind: AlertKind) -> Option<ClaimId> {
        let mut slots = self.slots.lock().await;

        if self.lookup(&slots, category, kind).await == AlertState::Sent {
            return None;
        }

        slots.next_claim += 1;
        let id = ClaimId(slots.next_claim);
        slots.entries.insert(
            (category.clone(), kind),
            Slot {
                state: AlertState::Sent,
                claim: Some(id),
            },
        );

        if let Err(e) = self.persist_sent(category, kind).await {
            tracing::warn!(
                category = %category,
                kind = %kind,
                error = %e,
                "Could not persist alert flag, keeping it in memory only"
            );
        }

        Some(id)
    }

    /// Record that an alert was sent
    pub async fn mark_sent(&self, category: &Category, kind: AlertKind) -> Result<()> {
        let mut slots = self.slots.lock().await;
        slots.entries.insert(
            (category.clone(), kind),
            Slot {
                state: AlertState::Sent,
                claim: None,
            },
        );
        self.persist_sent(category, kind).await
    }

    /// Clear the flag, re-arming future alerts.
    ///
    /// Returns `true` if the flag was set.
    pub async fn reset(&self, category: &Category, kind: AlertKind) -> Result<bool> {
        let mut slots = self.slots.lock().await;
        self.reset_locked(&mut slots, category, kind).await
    }

    /// Re-arm only if the flag still belongs to `claim`.
    ///
    /// Returns `true` if the flag was cleared.
    pub async fn release(
        &self,
        category: &Category,
        kind: AlertKind,
        claim: ClaimId,
    ) -> Result<bool> {
        let mut slots = self.slots.lock().await;

        let owned = slots
            .entries
            .get(&(category.clone(), kind))
            .is_some_and(|slot| slot.state == AlertState::Sent && slot.claim == Some(claim));
        if !owned {
            tracing::debug!(category = %category, kind = %kind, "Alert claim superseded, not released");
            return Ok(false);
        }

        self.reset_locked(&mut slots, category, kind).await
    }

    /// Reset every alert kind of a category
    pub async fn reset_category(&self, category: &Category) -> Result<()> {
        for kind in AlertKind::ALL {
            self.reset(category, kind).await?;
        }
        Ok(())
    }

    /// Number of (category, kind) pairs held in memory
    pub async fn tracked(&self) -> usize {
        self.slots.lock().await.entries.len()
    }

    async fn reset_locked(
        &self,
        slots: &mut Slots,
        category: &Category,
        kind: AlertKind,
    ) -> Result<bool> {
        let key = (category.clone(), kind);
        let tracked = slots.entries.contains_key(&key);
        let previous = self.lookup(slots, category, kind).await;

        if previous == AlertState::Sent {
            self.backing.remove(&record_key(category, kind)).await?;
            tracing::info!(category = %category, kind = %kind, "Alert re-armed");
        }

        // Untracked pairs that were already armed stay untracked
        if tracked || previous == AlertState::Sent {
            slots.entries.insert(
                key,
                Slot {
                    state: AlertState::Armed,
                    claim: None,
                },
            );
        }

        Ok(previous == AlertState::Sent)
    }

    /// Resolve a state from memory, falling back to the backing
    async fn lookup(&self, slots: &Slots, category: &Category, kind: AlertKind) -> AlertState {
        if let Some(slot) = slots.entries.get(&(category.clone(), kind)) {
            return slot.state;
        }

        match self.backing.load(&record_key(category, kind)).await {
            Ok(Some(raw)) => AlertRecord::decode(&raw).unwrap_or_else(|e| {
                tracing::warn!(
                    category = %category,
                    kind = %kind,
                    error = %e,
                    "Unreadable alert flag, treating as armed"
                );
                AlertState::Armed
            }),
            Ok(None) => AlertState::Armed,
            Err(e) => {
                tracing::warn!(
                    category = %category,
                    kind = %kind,
                    error = %e,
                    "Could not read alert flag, treating as armed"
                );
                AlertState::Armed
            }
        }
    }

    async fn persist_sent(&self, category: &Category, kind: AlertKind) -> Result<()> {
        let record = serde_json::to_string(&AlertRecord::sent_now())?;
        self.backing
            .store(&record_key(category, kind), &record)
            .await
    }
}

/// Backing key of an alert flag
fn record_key(category: &Category, kind: AlertKind) -> String {
    format!("alert.{}.{}", kind.as_str(), category.as_str())
}
