//! Snapshot contract for [`Task`].

use todo_core::error::CoreError;
use todo_core::snapshot::Snapshot;
use todo_core::types::{DbId, Timestamp};
use todo_db::models::status::TaskStatus;
use todo_db::models::task::{Task, DEFAULT_PRIORITY};

use super::StateSnapshot;

pub const TITLE: &str = "title";
pub const DESCRIPTION: &str = "description";
pub const STATUS: &str = "status";
pub const COMPLETED_AT: &str = "completedAt";
pub const PRIORITY: &str = "priority";
pub const DUE_DATE: &str = "dueDate";
pub const PROJECT_ID: &str = "projectId";
pub const TAG_IDS: &str = "tagIds";
pub const POSITION: &str = "position";
pub const CREATED_AT: &str = "createdAt";

/// Capturable task field groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Title,
    Description,
    /// `status` together with `completedAt`.
    Status,
    Priority,
    DueDate,
    Project,
    Tags,
    Position,
}

impl TaskField {
    pub const ALL: [TaskField; 8] = [
        TaskField::Title,
        TaskField::Description,
        TaskField::Status,
        TaskField::Priority,
        TaskField::DueDate,
        TaskField::Project,
        TaskField::Tags,
        TaskField::Position,
    ];
}

/// One typed restoration instruction for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskRestore {
    Title(String),
    Description(Option<String>),
    Status {
        status: TaskStatus,
        completed_at: Option<Timestamp>,
    },
    Priority(i16),
    DueDate(Option<Timestamp>),
    Project(Option<DbId>),
    Tags(Vec<DbId>),
    Position(i32),
}

fn ts(value: Option<Timestamp>) -> serde_json::Value {
    value.map_or(serde_json::Value::Null, |t| serde_json::Value::String(t.to_rfc3339()))
}

impl StateSnapshot for Task {
    type Field = TaskField;
    type Restore = TaskRestore;

    fn capture_state(&self, fields: &[TaskField]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        for field in fields {
            match field {
                TaskField::Title => snapshot.record(TITLE, self.title.clone()),
                TaskField::Description => snapshot.record(DESCRIPTION, self.description.clone()),
                TaskField::Status => {
                    snapshot.record(STATUS, self.status.as_str());
                    snapshot.record(COMPLETED_AT, ts(self.completed_at));
                }
                TaskField::Priority => snapshot.record(PRIORITY, self.priority),
                TaskField::DueDate => snapshot.record(DUE_DATE, ts(self.due_date)),
                TaskField::Project => snapshot.record(PROJECT_ID, self.project_id),
                TaskField::Tags => snapshot.record(TAG_IDS, self.tag_ids.clone()),
                TaskField::Position => snapshot.record(POSITION, self.position),
            }
        }
        snapshot
    }

    fn capture_full_state(&self) -> Snapshot {
        self.capture_state(&TaskField::ALL)
            .with(CREATED_AT, self.created_at.to_rfc3339())
    }

    fn decode_state(snapshot: &Snapshot) -> Result<Vec<TaskRestore>, CoreError> {
        let mut restores = Vec::new();
        if let Some(title) = snapshot.field::<String>(TITLE)? {
            restores.push(TaskRestore::Title(title));
        }
        if let Some(description) = snapshot.field::<Option<String>>(DESCRIPTION)? {
            restores.push(TaskRestore::Description(description));
        }
        if let Some(status) = snapshot.field::<TaskStatus>(STATUS)? {
            let completed_at = snapshot.field::<Option<Timestamp>>(COMPLETED_AT)?.flatten();
            restores.push(TaskRestore::Status {
                status,
                completed_at,
            });
        }
        if let Some(priority) = snapshot.field::<i16>(PRIORITY)? {
            restores.push(TaskRestore::Priority(priority));
        }
        if let Some(due_date) = snapshot.field::<Option<Timestamp>>(DUE_DATE)? {
            restores.push(TaskRestore::DueDate(due_date));
        }
        if let Some(project_id) = snapshot.field::<Option<DbId>>(PROJECT_ID)? {
            restores.push(TaskRestore::Project(project_id));
        }
        if let Some(tag_ids) = snapshot.field::<Vec<DbId>>(TAG_IDS)? {
            restores.push(TaskRestore::Tags(tag_ids));
        }
        if let Some(position) = snapshot.field::<i32>(POSITION)? {
            restores.push(TaskRestore::Position(position));
        }
        Ok(restores)
    }

    fn apply_state(&mut self, restores: Vec<TaskRestore>, now: Timestamp) {
        for restore in restores {
            match restore {
                TaskRestore::Title(title) => self.title = title,
                TaskRestore::Description(description) => self.description = description,
                TaskRestore::Status {
                    status,
                    completed_at,
                } => {
                    self.status = status;
                    self.completed_at = match status {
                        TaskStatus::Completed => Some(completed_at.unwrap_or(now)),
                        TaskStatus::Pending | TaskStatus::InProgress => None,
                    };
                }
                TaskRestore::Priority(priority) => self.priority = priority,
                TaskRestore::DueDate(due_date) => self.due_date = due_date,
                TaskRestore::Project(project_id) => self.project_id = project_id,
                TaskRestore::Tags(tag_ids) => self.tag_ids = tag_ids,
                TaskRestore::Position(position) => self.position = position,
            }
        }
    }
}

/// Build a blank task shell for re-creating a deleted task from its full
/// snapshot. The caller applies the decoded state on top.
pub fn task_shell(
    owner_id: DbId,
    id: DbId,
    snapshot: &Snapshot,
    now: Timestamp,
) -> Result<Task, CoreError> {
    if !snapshot.contains(TITLE) {
        return Err(CoreError::Internal(format!(
            "Delete snapshot for task {id} is missing '{TITLE}'"
        )));
    }
    let created_at = snapshot.field::<Timestamp>(CREATED_AT)?.unwrap_or(now);
    Ok(Task {
        id,
        owner_id,
        project_id: None,
        title: String::new(),
        description: None,
        status: TaskStatus::Pending,
        priority: DEFAULT_PRIORITY,
        due_date: None,
        completed_at: None,
        position: 0,
        tag_ids: Vec::new(),
        created_at,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: 10,
            owner_id: 1,
            project_id: Some(5),
            title: "Write report".into(),
            description: None,
            status: TaskStatus::Pending,
            priority: 3,
            due_date: None,
            completed_at: None,
            position: 2,
            tag_ids: vec![7, 8],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn captures_only_requested_fields() {
        let task = sample_task();
        let snapshot = task.capture_state(&[TaskField::Status]);
        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({"status": "pending", "completedAt": null})
        );
    }

    #[test]
    fn references_are_captured_as_raw_ids() {
        let task = sample_task();
        let snapshot = task.capture_state(&[TaskField::Project, TaskField::Tags]);
        assert_eq!(snapshot.get(PROJECT_ID), Some(&json!(5)));
        assert_eq!(snapshot.get(TAG_IDS), Some(&json!([7, 8])));
    }

    #[test]
    fn restoring_pending_clears_completion_timestamp() {
        let mut task = sample_task();
        let snapshot = task.capture_state(&[TaskField::Status]);

        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());

        let restores = Task::decode_state(&snapshot).unwrap();
        task.apply_state(restores, Utc::now());

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn restoring_completed_keeps_original_timestamp() {
        let mut task = sample_task();
        let done_at = Utc::now() - Duration::hours(2);
        task.status = TaskStatus::Completed;
        task.completed_at = Some(done_at);
        let snapshot = task.capture_state(&[TaskField::Status]);

        task.status = TaskStatus::Pending;
        task.completed_at = None;
        task.apply_state(Task::decode_state(&snapshot).unwrap(), Utc::now());

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(done_at));
    }

    #[test]
    fn completed_without_captured_timestamp_is_stamped_now() {
        let mut task = sample_task();
        let snapshot = Snapshot::new().with(STATUS, "completed");
        let now = Utc::now();
        task.apply_state(Task::decode_state(&snapshot).unwrap(), now);
        assert_eq!(task.completed_at, Some(now));
    }

    #[test]
    fn stray_completed_at_is_ignored_for_pending() {
        let mut task = sample_task();
        let snapshot = Snapshot::new()
            .with(STATUS, "pending")
            .with(COMPLETED_AT, Utc::now().to_rfc3339());
        task.apply_state(Task::decode_state(&snapshot).unwrap(), Utc::now());
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn full_state_rebuilds_task() {
        let original = sample_task();
        let snapshot = original.capture_full_state();
        let now = Utc::now();

        let mut rebuilt = task_shell(original.owner_id, original.id, &snapshot, now).unwrap();
        rebuilt.apply_state(Task::decode_state(&snapshot).unwrap(), now);

        assert_eq!(rebuilt.title, original.title);
        assert_eq!(rebuilt.project_id, original.project_id);
        assert_eq!(rebuilt.tag_ids, original.tag_ids);
        assert_eq!(rebuilt.position, original.position);
        assert_eq!(rebuilt.created_at, original.created_at);
    }

    #[test]
    fn shell_requires_title() {
        let err = task_shell(1, 2, &Snapshot::new(), Utc::now()).unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }

    #[test]
    fn malformed_snapshot_fails_decode() {
        let snapshot = Snapshot::new().with(STATUS, "finished");
        assert!(Task::decode_state(&snapshot).is_err());
    }
}
