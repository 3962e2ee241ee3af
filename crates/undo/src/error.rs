//! Error taxonomy for token issuance and redemption.

use todo_core::error::CoreError;
use todo_core::types::DbId;
use todo_core::undo::EntityType;

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum UndoError {
    /// Absent, owned by someone else, already consumed, or past its TTL.
    /// The cases are deliberately indistinguishable.
    #[error("Undo token not found or expired")]
    TokenNotFoundOrExpired,

    /// The target record no longer exists and the token does not undo a delete.
    #[error("{entity_type} {entity_id} no longer exists")]
    EntityGone {
        entity_type: EntityType,
        entity_id: DbId,
    },

    /// The token store could not be reached or timed out. The outcome of a
    /// redemption that hits this is unknown; nothing is reported as restored.
    #[error("Undo store unavailable: {0}")]
    StoreUnavailable(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for UndoError {
    fn from(err: StoreError) -> Self {
        UndoError::StoreUnavailable(err.to_string())
    }
}
