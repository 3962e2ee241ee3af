use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use todo_core::error::CoreError;
use todo_core::types::DbId;
use todo_undo::{IssuedToken, UndoError};

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce the
/// `{ "success": false, "error": { "code", "message", "details" } }` body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Issuance or redemption of an undo token failed.
    #[error(transparent)]
    Undo(#[from] UndoError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A batch stopped at a database error after changing `applied`.
    /// `undo` reverses those changes when it could be stored.
    #[error("Batch interrupted after {} item(s): {cause}", .applied.len())]
    BatchInterrupted {
        applied: Vec<DbId>,
        undo: Option<IssuedToken>,
        #[source]
        cause: sqlx::Error,
    },
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type ErrorParts = (StatusCode, &'static str, String, serde_json::Value);

fn internal() -> ErrorParts {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
        serde_json::Value::Null,
    )
}

fn classify_core_error(core: &CoreError) -> ErrorParts {
    let (status, code, message) = match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            return internal();
        }
    };
    (status, code, message, serde_json::Value::Null)
}

fn classify_undo_error(err: &UndoError) -> ErrorParts {
    match err {
        UndoError::TokenNotFoundOrExpired => (
            StatusCode::NOT_FOUND,
            "TOKEN_NOT_FOUND_OR_EXPIRED",
            err.to_string(),
            serde_json::Value::Null,
        ),
        UndoError::EntityGone {
            entity_type,
            entity_id,
        } => (
            StatusCode::GONE,
            "ENTITY_GONE",
            format!("{} no longer exists", entity_type.label()),
            json!({ "entityType": entity_type, "entityId": entity_id }),
        ),
        UndoError::StoreUnavailable(msg) => {
            tracing::error!(error = %msg, "Undo store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "STORE_UNAVAILABLE",
                "Undo is temporarily unavailable".to_string(),
                serde_json::Value::Null,
            )
        }
        UndoError::Core(core) => classify_core_error(core),
        UndoError::Database(db) => classify_sqlx_error(db),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Undo(undo) => classify_undo_error(undo),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::BatchInterrupted {
                applied,
                undo,
                cause,
            } => {
                tracing::error!(error = %cause, applied = applied.len(), "Batch interrupted");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "BATCH_INTERRUPTED",
                    "The batch stopped before finishing; applied changes can be undone"
                        .to_string(),
                    json!({ "affectedIds": applied, "undo": undo }),
                )
            }
        };

        let body = json!({
            "success": false,
            "error": {
                "code": code,
                "message": message,
                "details": details,
            },
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`) map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorParts {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
            serde_json::Value::Null,
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                        serde_json::Value::Null,
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            internal()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}
