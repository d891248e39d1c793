//! Persistence port.
//!
//! Handlers and the membership registry talk to storage only through [`Store`].
//! [`PgStore`] is the PostgreSQL adapter used in production; [`MemoryStore`]
//! keeps everything behind one lock and backs the test suite.
//!
//! Every multi-row operation on the trait (creating a project with its owner
//! membership, deleting a project with its memberships and tasks) is atomic in
//! both adapters.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Membership, NewProject, NewTask, NewUser, PasswordReset, ProfileChanges, Project,
    ProjectChanges, ProjectMember, ProjectSummary, Role, Task, TaskQuery, TaskUpdate, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors raised by store adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate value for {0}")]
    Duplicate(String),
    #[error("referenced {0} does not exist")]
    MissingReference(String),
    #[error("{0}")]
    Database(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Exact, case-sensitive match.
    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// The user holding this reset-token hash, if it has not expired at `now`.
    async fn user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<User>;

    /// Stores a new password hash and clears any pending reset.
    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<User>;

    async fn set_password_reset(&self, id: Uuid, reset: Option<PasswordReset>) -> StoreResult<()>;

    /// Removes the user, the projects they created, their memberships and the
    /// tasks they created. Tasks assigned to them become unassigned.
    async fn delete_user(&self, id: Uuid) -> StoreResult<()>;

    /// Inserts the project and the creator's `OWNER` membership together.
    async fn create_project(&self, project: NewProject) -> StoreResult<(Project, Membership)>;

    async fn project_by_id(&self, id: Uuid) -> StoreResult<Option<Project>>;

    /// Projects the user belongs to, with the user's role in each.
    async fn projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectSummary>>;

    async fn update_project(&self, id: Uuid, changes: &ProjectChanges) -> StoreResult<Project>;

    /// Deletes the project's tasks, memberships and the project row together.
    async fn delete_project(&self, id: Uuid) -> StoreResult<()>;

    async fn membership(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<Option<Membership>>;

    /// Fails with [`StoreError::Duplicate`] if the pair already has a row.
    async fn insert_membership(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        role: Role,
    ) -> StoreResult<Membership>;

    async fn set_member_role(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        role: Role,
    ) -> StoreResult<Membership>;

    /// Also unassigns the user from the project's tasks.
    async fn delete_membership(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<()>;

    async fn project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>>;

    async fn insert_task(&self, task: NewTask) -> StoreResult<Task>;

    async fn task_by_id(&self, id: Uuid) -> StoreResult<Option<Task>>;

    async fn project_tasks(&self, project_id: Uuid, filter: &TaskQuery) -> StoreResult<Vec<Task>>;

    async fn update_task(&self, id: Uuid, changes: &TaskUpdate) -> StoreResult<Task>;

    async fn set_task_assignee(&self, id: Uuid, assignee_id: Option<Uuid>) -> StoreResult<Task>;

    async fn delete_task(&self, id: Uuid) -> StoreResult<()>;

    /// Releases the underlying resources. Called once on shutdown.
    async fn close(&self) {}
}
