//! The state snapshot contract.
//!
//! Every undoable entity type exposes two capabilities:
//!
//! - `capture_state`: record the prior values of exactly the fields a
//!   mutation is about to change.
//! - `apply_state`: a restoration path separate from the normal setters.
//!   Snapshots are first decoded into a tagged restoration enum
//!   ([`task::TaskRestore`], [`project::ProjectRestore`]); each variant that
//!   owns a derived field carries it, so applying a status or archive flag
//!   always leaves the derived timestamp consistent with it.
//!
//! References to other owned records are captured as raw ids and are
//! re-authorized by [`crate::references`] before anything is applied.

pub mod project;
pub mod task;

use todo_core::error::CoreError;
use todo_core::snapshot::Snapshot;
use todo_core::types::Timestamp;

/// Capture/restore capability of an undoable entity.
pub trait StateSnapshot: Sized {
    /// Capturable field groups. Derived fields travel with their primary.
    type Field: Copy;
    /// Decoded, typed restoration instruction.
    type Restore;

    /// Prior values of `fields` only.
    fn capture_state(&self, fields: &[Self::Field]) -> Snapshot;

    /// Every restorable field, used before a delete so the record can be
    /// re-created.
    fn capture_full_state(&self) -> Snapshot;

    /// Decode a snapshot into restoration instructions.
    fn decode_state(snapshot: &Snapshot) -> Result<Vec<Self::Restore>, CoreError>;

    /// Apply decoded instructions. `now` fills a derived timestamp whose
    /// captured value is missing.
    fn apply_state(&mut self, restores: Vec<Self::Restore>, now: Timestamp);
}
