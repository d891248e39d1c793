use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's role within one project.
/// Corresponds to the `member_role` SQL enum.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Created the project. Cannot be promoted, demoted or removed.
    Owner,
    /// Manages members and tasks.
    Admin,
    /// Works on tasks.
    Member,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Owner, Role::Admin, Role::Member];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Role::Owner => 0b001,
            Role::Admin => 0b010,
            Role::Member => 0b100,
        }
    }
}

/// An unordered set of roles. Membership in the set is the only test:
/// allowing `Admin` says nothing about `Owner`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleSet(u8);

impl RoleSet {
    pub const fn empty() -> Self {
        RoleSet(0)
    }

    pub fn of(roles: &[Role]) -> Self {
        roles.iter().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn insert(&mut self, role: Role) {
        self.0 |= role.bit();
    }

    /// An empty set admits any member; otherwise the role must be listed.
    pub fn admits(&self, role: Role) -> bool {
        self.is_empty() || self.contains(role)
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::empty();
        for role in iter {
            set.insert(role);
        }
        set
    }
}

/// The (user, project) → role row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// A member of a project as shown in member listings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMember {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// Body of the add-member request.
#[derive(Debug, Deserialize, validator::Validate)]
pub struct AddMemberInput {
    #[validate(email)]
    pub email: String,
}

/// Body of the remove-member and role-change requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberTarget {
    #[serde(alias = "userIdToRemove")]
    pub user_id: Uuid,
}
