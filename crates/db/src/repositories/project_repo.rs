//! Repository for the `projects` table.

use sqlx::PgPool;
use todo_core::types::DbId;

use crate::models::project::{CreateProject, Project};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, owner_id, parent_id, name, description, is_archived, archived_at, \
                       position, created_at, updated_at";

/// Provides owner-scoped CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a new project at the end of its sibling list.
    pub async fn create(
        pool: &PgPool,
        owner_id: DbId,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (owner_id, parent_id, name, description, position)
             VALUES ($1, $2, $3, $4,
                     (SELECT COALESCE(MAX(position) + 1, 0) FROM projects
                      WHERE owner_id = $1 AND parent_id IS NOT DISTINCT FROM $2))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(owner_id)
            .bind(input.parent_id)
            .bind(&input.name)
            .bind(&input.description)
            .fetch_one(pool)
            .await
    }

    /// Find a project by id, only if it belongs to `owner_id`.
    pub async fn find_by_owner_and_id(
        pool: &PgPool,
        owner_id: DbId,
        id: DbId,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1 AND owner_id = $2");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .bind(owner_id)
            .fetch_optional(pool)
            .await
    }

    /// List all of the owner's projects, archived included, in display order.
    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM projects WHERE owner_id = $1 ORDER BY position, id"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Returns `true` if walking up the parent chain from `start_id` reaches
    /// `target_id` (inclusive of `start_id` itself). Only the owner's rows
    /// are followed.
    pub async fn ancestor_chain_contains(
        pool: &PgPool,
        owner_id: DbId,
        start_id: DbId,
        target_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let (found,): (bool,) = sqlx::query_as(
            "WITH RECURSIVE chain AS (
                SELECT id, parent_id FROM projects WHERE id = $1 AND owner_id = $3
                UNION
                SELECT p.id, p.parent_id FROM projects p
                JOIN chain c ON p.id = c.parent_id
                WHERE p.owner_id = $3
             )
             SELECT EXISTS (SELECT 1 FROM chain WHERE id = $2)",
        )
        .bind(start_id)
        .bind(target_id)
        .bind(owner_id)
        .fetch_one(pool)
        .await?;
        Ok(found)
    }

    /// Write every mutable column of `project` back to its row.
    ///
    /// Returns `None` if the row no longer exists for the owner.
    pub async fn save(pool: &PgPool, project: &Project) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "UPDATE projects SET
                parent_id = $3,
                name = $4,
                description = $5,
                is_archived = $6,
                archived_at = $7,
                position = $8
             WHERE id = $1 AND owner_id = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(project.id)
            .bind(project.owner_id)
            .bind(project.parent_id)
            .bind(&project.name)
            .bind(&project.description)
            .bind(project.is_archived)
            .bind(project.archived_at)
            .bind(project.position)
            .fetch_optional(pool)
            .await
    }

    /// Re-insert a previously deleted project under its original id.
    ///
    /// Returns `None` if a row with that id already exists.
    pub async fn insert_with_id(
        pool: &PgPool,
        project: &Project,
    ) -> Result<Option<Project>, sqlx::Error> {
        let query = format!(
            "INSERT INTO projects (id, owner_id, parent_id, name, description, is_archived, \
                                   archived_at, position, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (id) DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Project>(&query)
            .bind(project.id)
            .bind(project.owner_id)
            .bind(project.parent_id)
            .bind(&project.name)
            .bind(&project.description)
            .bind(project.is_archived)
            .bind(project.archived_at)
            .bind(project.position)
            .bind(project.created_at)
            .fetch_optional(pool)
            .await
    }

    /// Permanently delete a project. Child projects and tasks are detached
    /// by the `ON DELETE SET NULL` foreign keys. Returns `true` if a row was
    /// removed.
    pub async fn delete(pool: &PgPool, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
