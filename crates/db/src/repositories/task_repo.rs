//! Repository for the `tasks` table.

use sqlx::PgPool;
use todo_core::types::DbId;

use crate::models::task::{CreateTask, Task, DEFAULT_PRIORITY};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, project_id, title, description, status_id, priority, \
                       due_date, completed_at, position, tag_ids, created_at, updated_at";

/// Provides owner-scoped CRUD operations for tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Insert a new pending task at the end of the owner's list.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateTask,
    ) -> Result<Task, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (owner_id, project_id, title, description, priority, due_date, \
                                tag_ids, position)
             VALUES ($1, $2, $3, $4, $5, $6, $7,
                     (SELECT COALESCE(MAX(position) + 1, 0) FROM tasks WHERE owner_id = $1))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(owner_id)
            .bind(input.project_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.priority.unwrap_or(DEFAULT_PRIORITY))
            .bind(input.due_date)
            .bind(&input.tag_ids)
            .fetch_one(pool)
            .await
    }

    /// Find a task by id, only if it belongs to `owner_id`.
    pub async fn find_by_owner_and_id(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// Find every task in `ids` that belongs to `owner_id`. Missing or
    /// foreign ids are silently skipped.
    pub async fn find_many_by_owner(
        pool: &PgPool,
        owner_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<Task>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tasks WHERE owner_id = $1 AND id = ANY($2) ORDER BY position"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(owner_id)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// List the owner's tasks in display order.
    pub async fn list_for_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<Task>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM tasks WHERE owner_id = $1 ORDER BY position, id");
        sqlx::query_as::<_, Task>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Write every mutable column of `task` back to its row.
    ///
    /// Returns `None` if the row no longer exists for the owner.
    pub async fn save(pool: &PgPool, task: &Task) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE tasks SET
                project_id = $3,
                title = $4,
                description = $5,
                status_id = $6,
                priority = $7,
                due_date = $8,
                completed_at = $9,
                position = $10,
                tag_ids = $11
             WHERE id = $1 AND owner_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task.id)
            .bind(task.owner_id)
            .bind(task.project_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status.id())
            .bind(task.priority)
            .bind(task.due_date)
            .bind(task.completed_at)
            .bind(task.position)
            .bind(&task.tag_ids)
            .fetch_optional(pool)
            .await
    }

    /// Re-insert a previously deleted task under its original id.
    ///
    /// Returns `None` if a row with that id already exists.
    pub async fn insert_with_id(pool: &PgPool, task: &Task) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "INSERT INTO tasks (id, owner_id, project_id, title, description, status_id, \
                                priority, due_date, completed_at, position, tag_ids, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(task.id)
            .bind(task.owner_id)
            .bind(task.project_id)
            .bind(&task.title)
            .bind(&task.description)
            .bind(task.status.id())
            .bind(task.priority)
            .bind(task.due_date)
            .bind(task.completed_at)
            .bind(task.position)
            .bind(&task.tag_ids)
            .bind(task.created_at)
            .fetch_optional(pool)
            .await
    }

    /// Permanently delete a task. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
