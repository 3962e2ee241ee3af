//! Repository for the `tags` table.

use sqlx::PgPool;
use todo_core::types::DbId;

use crate::models::tag::{CreateTag, Tag};

const COLUMNS: &str = "id, owner_id, name, color, created_at, updated_at";

/// Provides owner-scoped operations for tags.
pub struct TagRepo;

impl TagRepo {
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateTag,
    ) -> Result<Tag, sqlx::Error> {
        let query = format!(
            "INSERT INTO tags (owner_id, name, color) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Tag>(&query)
            .bind(owner_id)
            .bind(&input.name)
            .bind(&input.color)
            .fetch_one(pool)
            .await
    }

    pub async fn list_for_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<Tag>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tags WHERE owner_id = $1 ORDER BY name");
        sqlx::query_as::<_, Tag>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Return the subset of `ids` that exist and belong to `owner_id`.
    pub async fn find_owned_ids(
        pool: &PgPool,
        owner_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<(DbId,)> =
            sqlx::query_as("SELECT id FROM tags WHERE owner_id = $1 AND id = ANY($2)")
                .bind(owner_id)
                .bind(ids)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
