//! Undo/redo token subsystem.
//!
//! Mutations on user-owned tasks and projects can be reversed exactly once
//! within a short window:
//!
//! - [`issuer::UndoIssuer`] captures a [`todo_core::snapshot::Snapshot`] of
//!   the fields a mutation changed and stores it under an opaque token.
//! - [`coordinator::UndoCoordinator`] atomically consumes a token,
//!   re-authorizes every restored reference against the redeeming owner,
//!   applies the prior state through the entity's restoration path and
//!   signals cache invalidation.
//! - [`batch`] does the same for a group of operations, newest first.
//!
//! [`store::TokenStore`] is the only network-facing seam; there is no way
//! to read a token without deleting it.

pub mod batch;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod issuer;
pub mod references;
pub mod snapshot;
pub mod store;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use todo_core::types::Timestamp;

pub use batch::{BatchItemResult, BatchItemStatus, BatchRestoreResult};
pub use config::UndoConfig;
pub use coordinator::{RestoreOutcome, UndoCoordinator};
pub use error::UndoError;
pub use gateway::EntityGateway;
pub use issuer::{IssuedToken, UndoIssuer};
pub use references::{DiscardReason, DiscardedReference};
pub use store::TokenStore;

/// Source of the current time. Swappable so expiry can be exercised
/// without sleeping.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// The wall clock.
pub fn system_clock() -> Clock {
    Arc::new(chrono::Utc::now)
}
