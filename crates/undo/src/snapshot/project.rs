//! Snapshot contract for [`Project`].

use todo_core::error::CoreError;
use todo_core::snapshot::Snapshot;
use todo_core::types::{DbId, Timestamp};
use todo_db::models::project::Project;

use super::StateSnapshot;

pub const NAME: &str = "name";
pub const DESCRIPTION: &str = "description";
pub const PARENT_ID: &str = "parentId";
pub const IS_ARCHIVED: &str = "isArchived";
pub const ARCHIVED_AT: &str = "archivedAt";
pub const POSITION: &str = "position";
pub const CREATED_AT: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectField {
    Name,
    Description,
    Parent,
    /// `isArchived` together with `archivedAt`.
    Archived,
    Position,
}

impl ProjectField {
    pub const ALL: [ProjectField; 5] = [
        ProjectField::Name,
        ProjectField::Description,
        ProjectField::Parent,
        ProjectField::Archived,
        ProjectField::Position,
    ];
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectRestore {
    Name(String),
    Description(Option<String>),
    Parent(Option<DbId>),
    Archived {
        is_archived: bool,
        archived_at: Option<Timestamp>,
    },
    Position(i32),
}

impl StateSnapshot for Project {
    type Field = ProjectField;
    type Restore = ProjectRestore;

    fn capture_state(&self, fields: &[ProjectField]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for field in fields {
            match field {
                ProjectField::Name => snapshot.record(NAME, self.name.clone()),
                ProjectField::Description => snapshot.record(DESCRIPTION, self.description.clone()),
                ProjectField::Parent => snapshot.record(PARENT_ID, self.parent_id),
                ProjectField::Archived => {
                    snapshot.record(IS_ARCHIVED, self.is_archived);
                    snapshot.record(ARCHIVED_AT, self.archived_at.map(|t| t.to_rfc3339()));
                }
                ProjectField::Position => snapshot.record(POSITION, self.position),
            }
        }
        snapshot
    }

    fn capture_full_state(&self) -> Snapshot {
        self.capture_state(&ProjectField::ALL)
            .with(CREATED_AT, self.created_at.to_rfc3339())
    }

    fn decode_state(snapshot: &Snapshot) -> Result<Vec<ProjectRestore>, CoreError> {
        let mut restores = Vec::new();
        if let Some(name) = snapshot.field::<String>(NAME)? {
            restores.push(ProjectRestore::Name(name));
        }
        if let Some(description) = snapshot.field::<Option<String>>(DESCRIPTION)? {
            restores.push(ProjectRestore::Description(description));
        }
        if let Some(parent_id) = snapshot.field::<Option<DbId>>(PARENT_ID)? {
            restores.push(ProjectRestore::Parent(parent_id));
        }
        if let Some(is_archived) = snapshot.field::<bool>(IS_ARCHIVED)? {
            let archived_at = snapshot.field::<Option<Timestamp>>(ARCHIVED_AT)?.flatten();
            restores.push(ProjectRestore::Archived {
                is_archived,
                archived_at,
            });
        }
        if let Some(position) = snapshot.field::<i32>(POSITION)? {
            restores.push(ProjectRestore::Position(position));
        }
        Ok(restores)
    }

    fn apply_state(&mut self, restores: Vec<ProjectRestore>, now: Timestamp) {
        for restore in restores {
            match restore {
                ProjectRestore::Name(name) => self.name = name,
                ProjectRestore::Description(description) => self.description = description,
                ProjectRestore::Parent(parent_id) => self.parent_id = parent_id,
                ProjectRestore::Archived {
                    is_archived,
                    archived_at,
                } => {
                    self.is_archived = is_archived;
                    self.archived_at = is_archived.then(|| archived_at.unwrap_or(now));
                }
                ProjectRestore::Position(position) => self.position = position,
            }
        }
    }
}

/// Blank project shell for re-creating a deleted project.
pub fn project_shell(
    owner_id: DbId,
    id: DbId,
    snapshot: &Snapshot,
    now: Timestamp,
) -> Result<Project, CoreError> {
    if !snapshot.contains(NAME) {
        return Err(CoreError::Internal(format!(
            "Delete snapshot for project {id} is missing '{NAME}'"
        )));
    }
    let created_at = snapshot.field::<Timestamp>(CREATED_AT)?.unwrap_or(now);
    Ok(Project {
        id,
        owner_id,
        parent_id: None,
        name: String::new(),
        description: None,
        is_archived: false,
        archived_at: None,
        position: 0,
        created_at,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn sample_project() -> Project {
        let now = Utc::now();
        Project {
            id: 3,
            owner_id: 1,
            parent_id: Some(2),
            name: "Home".into(),
            description: Some("chores".into()),
            is_archived: false,
            archived_at: None,
            position: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn archive_capture_includes_derived_timestamp() {
        let snapshot = sample_project().capture_state(&[ProjectField::Archived]);
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({"isArchived": false, "archivedAt": null})
        );
    }

    #[test]
    fn unarchive_restore_clears_archived_at() {
        let mut project = sample_project();
        let snapshot = project.capture_state(&[ProjectField::Archived]);
        project.is_archived = true;
        project.archived_at = Some(Utc::now());

        project.apply_state(Project::decode_state(&snapshot).unwrap(), Utc::now());
        assert!(!project.is_archived);
        assert_eq!(project.archived_at, None);
    }

    #[test]
    fn rearchive_restore_sets_archived_at() {
        let mut project = sample_project();
        project.is_archived = true;
        let archived_at = Utc::now();
        project.archived_at = Some(archived_at);
        let snapshot = project.capture_state(&[ProjectField::Archived]);

        project.is_archived = false;
        project.archived_at = None;
        project.apply_state(Project::decode_state(&snapshot).unwrap(), Utc::now());
        assert!(project.is_archived);
        assert_eq!(project.archived_at, Some(archived_at));
    }

    #[test]
    fn parent_null_is_restored_as_root() {
        let mut project = sample_project();
        let snapshot = Snapshot::new().with(PARENT_ID, serde_json::Value::Null);
        project.apply_state(Project::decode_state(&snapshot).unwrap(), Utc::now());
        assert_eq!(project.parent_id, None);
    }

    #[test]
    fn shell_requires_name() {
        assert!(project_shell(1, 3, &Snapshot::new(), Utc::now()).is_err());
        let snapshot = sample_project().capture_full_state();
        let shell = project_shell(1, 3, &snapshot, Utc::now()).unwrap();
        assert_eq!(shell.id, 3);
    }
}
