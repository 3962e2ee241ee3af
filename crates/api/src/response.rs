//! Shared response envelope for API handlers.
//!
//! Every success body is `{ "success": true, "data": ..., "meta": ... }`.
//! `meta` carries the undo affordance of a mutation and is omitted when no
//! token was issued.

use serde::Serialize;
use todo_undo::IssuedToken;

#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<IssuedToken>,
}

impl<T: Serialize> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            meta: None,
        }
    }

    /// Attach the undo token minted for this mutation, if any.
    pub fn with_undo(data: T, undo: Option<IssuedToken>) -> Self {
        Self {
            success: true,
            data,
            meta: undo,
        }
    }
}
