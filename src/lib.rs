//! Category Router Library
//!
//! Routes perishable-food sensor payloads to the prediction endpoint of the
//! active category.
//!
//! ## Architecture
//!
//! 1. DurableBacking - persisted key-value slots (file or memory)
//! 2. CategoryStore - active category, cache in front of the backing record
//! 3. AlertDeduplicator - one notification per spoilage onset
//! 4. Notifier - outbound messages (Telegram or log only)
//! 5. ModelClient - forwards payloads to model endpoints
//! 6. CategoryRouter - get/set category, forward, alert gating
//! 7. WebAPI - HTTP routes
//!
//! ## Design Principles
//!
//! - State is owned by explicit components injected into the router
//! - Only state checks run under locks, never network calls
//! - Notifications never fail or delay the primary response

pub mod alert_dedup;
pub mod category_router;
pub mod category_store;
pub mod durable_backing;
pub mod model_client;
pub mod models;
pub mod notifier;
pub mod spoilage_detector;
pub mod web_api;
pub mod error;
pub mod state;

pub use error::{Error, Result};
pub use state::AppState;
