use serde::{Deserialize, Deserializer};

pub mod membership;
pub mod project;
pub mod task;
pub mod user;

pub use membership::{AddMemberInput, MemberTarget, Membership, ProjectMember, Role, RoleSet};
pub use project::{NewProject, Project, ProjectChanges, ProjectInput, ProjectSummary};
pub use task::{AssignInput, NewTask, Task, TaskInput, TaskPriority, TaskQuery, TaskStatus, TaskUpdate};
pub use user::{NewUser, PasswordReset, ProfileChanges, PublicUser, User, UserProfile};

/// For fields that can be cleared: absent stays `None`, an explicit `null`
/// becomes `Some(None)`. Use together with `#[serde(default)]`.
pub fn clearable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
