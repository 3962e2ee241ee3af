//! In-memory [`EntityGateway`] mirroring the Postgres semantics, including
//! owner scoping and `ON DELETE SET NULL` detachment.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use todo_core::types::DbId;
use todo_db::models::project::{CreateProject, Project};
use todo_db::models::status::TaskStatus;
use todo_db::models::tag::{CreateTag, Tag};
use todo_db::models::task::{CreateTask, Task, DEFAULT_PRIORITY};

use super::EntityGateway;

#[derive(Debug, Default)]
struct Tables {
    tasks: BTreeMap<DbId, Task>,
    projects: BTreeMap<DbId, Project>,
    tags: BTreeMap<DbId, Tag>,
}

#[derive(Debug)]
pub struct MemoryGateway {
    tables: Mutex<Tables>,
    next_id: AtomicI64,
    /// Writes admitted before every further write fails.
    writes_left: AtomicUsize,
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            next_id: AtomicI64::new(1),
            writes_left: AtomicUsize::new(usize::MAX),
        }
    }
}

fn poisoned() -> sqlx::Error {
    sqlx::Error::Protocol("memory gateway lock poisoned".into())
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> DbId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn admit_write(&self) -> Result<(), sqlx::Error> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| sqlx::Error::Protocol("memory gateway write limit reached".into()))
    }

    /// Let `remaining` more writes succeed, then fail every write until
    /// [`unlimit_writes`](Self::unlimit_writes) is called.
    pub fn limit_writes(&self, remaining: usize) {
        self.writes_left.store(remaining, Ordering::SeqCst);
    }

    pub fn unlimit_writes(&self) {
        self.writes_left.store(usize::MAX, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, Tables>, sqlx::Error> {
        self.tables.lock().map_err(|_| poisoned())
    }

    /// Create a tag for `owner_id` and return its id.
    pub fn add_tag(&self, owner_id: DbId) -> DbId {
        let id = self.next_id();
        let now = Utc::now();
        if let Ok(mut tables) = self.tables.lock() {
            tables.tags.insert(
                id,
                Tag {
                    id,
                    owner_id,
                    name: format!("tag-{id}"),
                    color: None,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        id
    }

    pub fn remove_tag(&self, id: DbId) {
        if let Ok(mut tables) = self.tables.lock() {
            tables.tags.remove(&id);
        }
    }

    /// Hand a project over to another owner, as an account transfer would.
    pub fn transfer_project(&self, id: DbId, new_owner_id: DbId) {
        if let Ok(mut tables) = self.tables.lock() {
            if let Some(project) = tables.projects.get_mut(&id) {
                project.owner_id = new_owner_id;
            }
        }
    }
}

#[async_trait]
impl EntityGateway for MemoryGateway {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        self.tables().map(|_| ())
    }

    async fn create_task(&self, owner_id: DbId, input: &CreateTask) -> Result<Task, sqlx::Error> {
        self.admit_write()?;
        let id = self.next_id();
        let now = Utc::now();
        let mut tables = self.tables()?;
        let position = tables
            .tasks
            .values()
            .filter(|t| t.owner_id == owner_id)
            .map(|t| t.position + 1)
            .max()
            .unwrap_or(0);
        let task = Task {
            id,
            owner_id,
            project_id: input.project_id,
            title: input.title.clone(),
            description: input.description.clone(),
            status: TaskStatus::Pending,
            priority: input.priority.unwrap_or(DEFAULT_PRIORITY),
            due_date: input.due_date,
            completed_at: None,
            position,
            tag_ids: input.tag_ids.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(id, task.clone());
        Ok(task)
    }

    async fn find_task(&self, owner_id: DbId, id: DbId) -> Result<Option<Task>, sqlx::Error> {
        Ok(self
            .tables()?
            .tasks
            .get(&id)
            .filter(|t| t.owner_id == owner_id)
            .cloned())
    }

    async fn list_tasks(&self, owner_id: DbId) -> Result<Vec<Task>, sqlx::Error> {
        let mut tasks: Vec<Task> = self
            .tables()?
            .tasks
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| (t.position, t.id));
        Ok(tasks)
    }

    async fn find_tasks(&self, owner_id: DbId, ids: &[DbId]) -> Result<Vec<Task>, sqlx::Error> {
        let tables = self.tables()?;
        let mut found: Vec<Task> = ids
            .iter()
            .filter_map(|id| tables.tasks.get(id))
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.position, t.id));
        found.dedup_by_key(|t| t.id);
        Ok(found)
    }

    async fn save_task(&self, task: &Task) -> Result<Option<Task>, sqlx::Error> {
        self.admit_write()?;
        let mut tables = self.tables()?;
        match tables.tasks.get_mut(&task.id) {
            Some(row) if row.owner_id == task.owner_id => {
                *row = Task {
                    created_at: row.created_at,
                    updated_at: Utc::now(),
                    ..task.clone()
                };
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_task(&self, task: &Task) -> Result<Option<Task>, sqlx::Error> {
        self.admit_write()?;
        let mut tables = self.tables()?;
        if tables.tasks.contains_key(&task.id) {
            return Ok(None);
        }
        let row = Task {
            updated_at: Utc::now(),
            ..task.clone()
        };
        tables.tasks.insert(task.id, row.clone());
        Ok(Some(row))
    }

    async fn delete_task(&self, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        self.admit_write()?;
        let mut tables = self.tables()?;
        if tables.tasks.get(&id).is_some_and(|t| t.owner_id == owner_id) {
            tables.tasks.remove(&id);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn create_project(
        &self,
        owner_id: DbId,
        input: &CreateProject,
    ) -> Result<Project, sqlx::Error> {
        self.admit_write()?;
        let id = self.next_id();
        let now = Utc::now();
        let mut tables = self.tables()?;
        let position = tables
            .projects
            .values()
            .filter(|p| p.owner_id == owner_id && p.parent_id == input.parent_id)
            .map(|p| p.position + 1)
            .max()
            .unwrap_or(0);
        let project = Project {
            id,
            owner_id,
            parent_id: input.parent_id,
            name: input.name.clone(),
            description: input.description.clone(),
            is_archived: false,
            archived_at: None,
            position,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(id, project.clone());
        Ok(project)
    }

    async fn find_project(&self, owner_id: DbId, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        Ok(self
            .tables()?
            .projects
            .get(&id)
            .filter(|p| p.owner_id == owner_id)
            .cloned())
    }

    async fn list_projects(&self, owner_id: DbId) -> Result<Vec<Project>, sqlx::Error> {
        let mut projects: Vec<Project> = self
            .tables()?
            .projects
            .values()
            .filter(|p| p.owner_id == owner_id)
            .cloned()
            .collect();
        projects.sort_by_key(|p| (p.position, p.id));
        Ok(projects)
    }

    async fn save_project(&self, project: &Project) -> Result<Option<Project>, sqlx::Error> {
        self.admit_write()?;
        let mut tables = self.tables()?;
        match tables.projects.get_mut(&project.id) {
            Some(row) if row.owner_id == project.owner_id => {
                *row = Project {
                    created_at: row.created_at,
                    updated_at: Utc::now(),
                    ..project.clone()
                };
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn insert_project(&self, project: &Project) -> Result<Option<Project>, sqlx::Error> {
        self.admit_write()?;
        let mut tables = self.tables()?;
        if tables.projects.contains_key(&project.id) {
            return Ok(None);
        }
        let row = Project {
            updated_at: Utc::now(),
            ..project.clone()
        };
        tables.projects.insert(project.id, row.clone());
        Ok(Some(row))
    }

    async fn delete_project(&self, owner_id: DbId, id: DbId) -> Result<bool, sqlx::Error> {
        self.admit_write()?;
        let mut tables = self.tables()?;
        if !tables.projects.get(&id).is_some_and(|p| p.owner_id == owner_id) {
            return Ok(false);
        }
        tables.projects.remove(&id);
        for child in tables.projects.values_mut() {
            if child.parent_id == Some(id) {
                child.parent_id = None;
            }
        }
        for task in tables.tasks.values_mut() {
            if task.project_id == Some(id) {
                task.project_id = None;
            }
        }
        Ok(true)
    }

    async fn project_chain_contains(
        &self,
        owner_id: DbId,
        start_id: DbId,
        target_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let tables = self.tables()?;
        let mut current = Some(start_id);
        let mut steps = 0;
        while let Some(id) = current {
            let Some(project) = tables.projects.get(&id).filter(|p| p.owner_id == owner_id) else {
                break;
            };
            if project.id == target_id {
                return Ok(true);
            }
            current = project.parent_id;
            steps += 1;
            if steps > tables.projects.len() {
                break;
            }
        }
        Ok(false)
    }

    async fn create_tag(&self, owner_id: DbId, input: &CreateTag) -> Result<Tag, sqlx::Error> {
        self.admit_write()?;
        let id = self.next_id();
        let now = Utc::now();
        let tag = Tag {
            id,
            owner_id,
            name: input.name.clone(),
            color: input.color.clone(),
            created_at: now,
            updated_at: now,
        };
        self.tables()?.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn list_tags(&self, owner_id: DbId) -> Result<Vec<Tag>, sqlx::Error> {
        let mut tags: Vec<Tag> = self
            .tables()?
            .tags
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn find_owned_tag_ids(
        &self,
        owner_id: DbId,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.tags.get(id).is_some_and(|t| t.owner_id == owner_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_task(title: &str) -> CreateTask {
        CreateTask {
            title: title.to_string(),
            description: None,
            priority: None,
            due_date: None,
            project_id: None,
            tag_ids: Vec::new(),
        }
    }

    #[tokio::test]
    async fn write_limit_fails_later_writes_but_not_reads() {
        let gateway = MemoryGateway::new();
        let task = gateway.create_task(1, &new_task("a")).await.unwrap();

        gateway.limit_writes(1);
        assert!(gateway.delete_task(1, task.id).await.unwrap());
        assert!(gateway.create_task(1, &new_task("b")).await.is_err());
        assert!(gateway.list_tasks(1).await.unwrap().is_empty());

        gateway.unlimit_writes();
        assert!(gateway.create_task(1, &new_task("b")).await.is_ok());
    }
}
