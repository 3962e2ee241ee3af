//! Task entity model and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use todo_core::types::{DbId, Timestamp};

use crate::models::status::TaskStatus;

/// A task row from the `tasks` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: DbId,
    pub owner_id: DbId,
    pub project_id: Option<DbId>,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "status_id", try_from = "i16")]
    pub status: TaskStatus,
    pub priority: i16,
    pub due_date: Option<Timestamp>,
    /// Set exactly when `status` is `Completed`.
    pub completed_at: Option<Timestamp>,
    pub position: i32,
    pub tag_ids: Vec<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a new task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    /// Defaults to 3 if omitted.
    pub priority: Option<i16>,
    pub due_date: Option<Timestamp>,
    pub project_id: Option<DbId>,
    #[serde(default)]
    pub tag_ids: Vec<DbId>,
}

/// DTO for patching a task. All fields are optional; nullable fields use a
/// nested `Option` so that an explicit `null` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub title: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    pub priority: Option<i16>,
    #[serde(default, with = "double_option")]
    pub due_date: Option<Option<Timestamp>>,
    #[serde(default, with = "double_option")]
    pub project_id: Option<Option<DbId>>,
    pub tag_ids: Option<Vec<DbId>>,
}

/// Lowest allowed task priority.
pub const MIN_PRIORITY: i16 = 1;
/// Highest allowed task priority.
pub const MAX_PRIORITY: i16 = 5;
/// Priority assigned when the client omits one.
pub const DEFAULT_PRIORITY: i16 = 3;

/// Deserialize helper distinguishing an absent field from an explicit `null`.
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_distinguishes_null_from_absent() {
        let patch: UpdateTask =
            serde_json::from_value(serde_json::json!({"projectId": null, "title": "x"})).unwrap();
        assert_eq!(patch.project_id, Some(None));
        assert_eq!(patch.description, None);
        assert_eq!(patch.title.as_deref(), Some("x"));

        let patch: UpdateTask =
            serde_json::from_value(serde_json::json!({"projectId": 4})).unwrap();
        assert_eq!(patch.project_id, Some(Some(4)));
    }
}
