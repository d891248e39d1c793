use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the priority of a task.
/// Corresponds to the `task_priority` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    /// Low priority.
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

/// Represents the status of a task.
/// Corresponds to the `task_status` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Task is yet to be started.
    Todo,
    /// Task is currently being worked on.
    InProgress,
    /// Task is completed.
    Done,
}

/// Input structure for creating a task. New tasks always start as `TODO`.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Maximum length of 1000 characters if provided.
    #[validate(length(max = 1000))]
    pub description: Option<String>,

    /// Defaults to `MEDIUM` when absent.
    pub priority: Option<TaskPriority>,

    pub due_date: Option<DateTime<Utc>>,
}

/// Partial update of a task. Absent fields are left unchanged; `description`
/// and `dueDate` are cleared by an explicit `null`.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 1000))]
    #[serde(default, deserialize_with = "super::clearable")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "super::clearable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

/// Represents a task entity as stored in the database and returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task (UUID v4).
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    /// The project this task belongs to.
    pub project_id: Uuid,
    /// Identifier of the user who created the task.
    pub created_by: Uuid,
    /// Identifier of the project member the task is assigned to.
    pub assignee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents query parameters for filtering tasks when listing them.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    /// Case-insensitive match against title and description.
    pub search: Option<String>,
}

impl TaskQuery {
    /// In-memory equivalent of the SQL filter.
    pub fn matches(&self, task: &Task) -> bool {
        if self.status.map_or(false, |status| task.status != status) {
            return false;
        }
        if self.priority.map_or(false, |priority| task.priority != priority) {
            return false;
        }
        if self.assignee_id.is_some() && task.assignee_id != self.assignee_id {
            return false;
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let in_title = task.title.to_lowercase().contains(&needle);
            let in_description = task
                .description
                .as_deref()
                .map_or(false, |d| d.to_lowercase().contains(&needle));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

/// Body of the assign request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignInput {
    pub user_id: Uuid,
}

/// Data needed to insert a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Uuid,
    pub created_by: Uuid,
}

impl NewTask {
    pub fn new(input: TaskInput, project_id: Uuid, created_by: Uuid) -> Self {
        Self {
            title: input.title,
            description: input.description,
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            project_id,
            created_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(title: &str, description: Option<&str>) -> Task {
        let now = Utc::now();
        Task {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: description.map(String::from),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_date: None,
            project_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            assignee_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_new_task_defaults() {
        let input = TaskInput {
            title: "Test Task".to_string(),
            description: Some("Test Description".to_string()),
            priority: None,
            due_date: Some(Utc::now()),
        };
        let project_id = Uuid::new_v4();
        let creator = Uuid::new_v4();

        let task = NewTask::new(input, project_id, creator);
        assert_eq!(task.title, "Test Task");
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.project_id, project_id);
        assert_eq!(task.created_by, creator);
    }

    #[test]
    fn test_task_validation() {
        let valid_input = TaskInput {
            title: "Valid Task".to_string(),
            description: Some("Valid Description".to_string()),
            priority: Some(TaskPriority::High),
            due_date: Some(Utc::now()),
        };
        assert!(valid_input.validate().is_ok());

        let invalid_input = TaskInput {
            title: "".to_string(),
            description: None,
            priority: None,
            due_date: None,
        };
        assert!(invalid_input.validate().is_err());

        let long_description = TaskUpdate {
            description: Some(Some("b".repeat(1001))),
            ..Default::default()
        };
        assert!(long_description.validate().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            "IN_PROGRESS"
        );
        assert_eq!(serde_json::to_value(TaskPriority::High).unwrap(), "HIGH");
    }

    #[test]
    fn test_task_query_matches() {
        let wireframes = task("Design Wireframes", Some("low-fidelity sketches"));

        assert!(TaskQuery::default().matches(&wireframes));
        assert!(TaskQuery {
            search: Some("WIRE".to_string()),
            ..Default::default()
        }
        .matches(&wireframes));
        assert!(TaskQuery {
            search: Some("sketch".to_string()),
            ..Default::default()
        }
        .matches(&wireframes));
        assert!(!TaskQuery {
            status: Some(TaskStatus::Done),
            ..Default::default()
        }
        .matches(&wireframes));
        assert!(!TaskQuery {
            assignee_id: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .matches(&wireframes));
    }
}
