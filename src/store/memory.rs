use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::{
    Membership, NewProject, NewTask, NewUser, PasswordReset, ProfileChanges, Project,
    ProjectChanges, ProjectMember, ProjectSummary, Role, Task, TaskQuery, TaskStatus, TaskUpdate,
    User,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    projects: HashMap<Uuid, Project>,
    memberships: HashMap<(Uuid, Uuid), Membership>,
    tasks: HashMap<Uuid, Task>,
}

impl Tables {
    fn remove_project(&mut self, id: Uuid) {
        self.tasks.retain(|_, task| task.project_id != id);
        self.memberships.retain(|(_, project_id), _| *project_id != id);
        self.projects.remove(&id);
    }
}

/// In-process store. One lock guards all tables, so every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of membership rows for a project.
    pub async fn membership_count(&self, project_id: Uuid) -> usize {
        let tables = self.tables.lock().await;
        tables
            .memberships
            .keys()
            .filter(|(_, pid)| *pid == project_id)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email".into()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| {
                u.password_reset_token.as_deref() == Some(token_hash)
                    && u.password_reset_expires.map_or(false, |expires| expires > now)
            })
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let tables = self.tables.lock().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if let Some(email) = &changes.email {
            if tables.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Duplicate("email".into()));
            }
        }

        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(name) = &changes.name {
            user.name = name.clone();
        }
        if let Some(email) = &changes.email {
            user.email = email.clone();
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.password_reset_token = None;
        user.password_reset_expires = None;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_password_reset(&self, id: Uuid, reset: Option<PasswordReset>) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let user = tables.users.get_mut(&id).ok_or(StoreError::NotFound)?;
        match reset {
            Some(reset) => {
                user.password_reset_token = Some(reset.token_hash);
                user.password_reset_expires = Some(reset.expires_at);
            }
            None => {
                user.password_reset_token = None;
                user.password_reset_expires = None;
            }
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }

        let owned: Vec<Uuid> = tables
            .projects
            .values()
            .filter(|p| p.creator_id == id)
            .map(|p| p.id)
            .collect();
        for project_id in owned {
            tables.remove_project(project_id);
        }

        tables.memberships.retain(|(user_id, _), _| *user_id != id);
        tables.tasks.retain(|_, task| task.created_by != id);
        for task in tables.tasks.values_mut() {
            if task.assignee_id == Some(id) {
                task.assignee_id = None;
            }
        }
        Ok(())
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<(Project, Membership)> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&project.creator_id) {
            return Err(StoreError::MissingReference("user".into()));
        }

        let now = Utc::now();
        let project = Project {
            id: Uuid::new_v4(),
            name: project.name,
            description: project.description,
            start_date: project.start_date,
            end_date: project.end_date,
            creator_id: project.creator_id,
            created_at: now,
            updated_at: now,
        };
        let owner = Membership {
            user_id: project.creator_id,
            project_id: project.id,
            role: Role::Owner,
            created_at: now,
        };
        tables.projects.insert(project.id, project.clone());
        tables
            .memberships
            .insert((owner.user_id, owner.project_id), owner.clone());
        Ok((project, owner))
    }

    async fn project_by_id(&self, id: Uuid) -> StoreResult<Option<Project>> {
        Ok(self.tables.lock().await.projects.get(&id).cloned())
    }

    async fn projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectSummary>> {
        let tables = self.tables.lock().await;
        let mut projects: Vec<ProjectSummary> = tables
            .memberships
            .values()
            .filter(|m| m.user_id == user_id)
            .filter_map(|m| {
                tables.projects.get(&m.project_id).map(|project| ProjectSummary {
                    project: project.clone(),
                    role: m.role,
                })
            })
            .collect();
        projects.sort_by(|a, b| b.project.created_at.cmp(&a.project.created_at));
        Ok(projects)
    }

    async fn update_project(&self, id: Uuid, changes: &ProjectChanges) -> StoreResult<Project> {
        let mut tables = self.tables.lock().await;
        let project = tables.projects.get_mut(&id).ok_or(StoreError::NotFound)?;
        let mut merged = changes.apply_to(project);
        merged.updated_at = Utc::now();
        *project = merged.clone();
        Ok(merged)
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.projects.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        tables.remove_project(id);
        Ok(())
    }

    async fn membership(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<Option<Membership>> {
        let tables = self.tables.lock().await;
        Ok(tables.memberships.get(&(user_id, project_id)).cloned())
    }

    async fn insert_membership(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        role: Role,
    ) -> StoreResult<Membership> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::MissingReference("user".into()));
        }
        if !tables.projects.contains_key(&project_id) {
            return Err(StoreError::MissingReference("project".into()));
        }
        if tables.memberships.contains_key(&(user_id, project_id)) {
            return Err(StoreError::Duplicate("membership".into()));
        }

        let membership = Membership {
            user_id,
            project_id,
            role,
            created_at: Utc::now(),
        };
        tables
            .memberships
            .insert((user_id, project_id), membership.clone());
        Ok(membership)
    }

    async fn set_member_role(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        role: Role,
    ) -> StoreResult<Membership> {
        let mut tables = self.tables.lock().await;
        let membership = tables
            .memberships
            .get_mut(&(user_id, project_id))
            .ok_or(StoreError::NotFound)?;
        membership.role = role;
        Ok(membership.clone())
    }

    async fn delete_membership(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.memberships.remove(&(user_id, project_id)).is_none() {
            return Err(StoreError::NotFound);
        }

        let now = Utc::now();
        for task in tables.tasks.values_mut() {
            if task.project_id == project_id && task.assignee_id == Some(user_id) {
                task.assignee_id = None;
                task.updated_at = now;
            }
        }
        Ok(())
    }

    async fn project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>> {
        let tables = self.tables.lock().await;
        let mut members: Vec<ProjectMember> = tables
            .memberships
            .values()
            .filter(|m| m.project_id == project_id)
            .filter_map(|m| {
                tables.users.get(&m.user_id).map(|user| ProjectMember {
                    user_id: user.id,
                    name: user.name.clone(),
                    email: user.email.clone(),
                    role: m.role,
                    joined_at: m.created_at,
                })
            })
            .collect();
        members.sort_by_key(|m| m.joined_at);
        Ok(members)
    }

    async fn insert_task(&self, task: NewTask) -> StoreResult<Task> {
        let mut tables = self.tables.lock().await;
        if !tables.projects.contains_key(&task.project_id) {
            return Err(StoreError::MissingReference("project".into()));
        }
        if !tables.users.contains_key(&task.created_by) {
            return Err(StoreError::MissingReference("user".into()));
        }

        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            title: task.title,
            description: task.description,
            status: TaskStatus::Todo,
            priority: task.priority,
            due_date: task.due_date,
            project_id: task.project_id,
            created_by: task.created_by,
            assignee_id: None,
            created_at: now,
            updated_at: now,
        };
        tables.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn task_by_id(&self, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(self.tables.lock().await.tasks.get(&id).cloned())
    }

    async fn project_tasks(&self, project_id: Uuid, filter: &TaskQuery) -> StoreResult<Vec<Task>> {
        let tables = self.tables.lock().await;
        let mut tasks: Vec<Task> = tables
            .tasks
            .values()
            .filter(|t| t.project_id == project_id && filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, changes: &TaskUpdate) -> StoreResult<Task> {
        let mut tables = self.tables.lock().await;
        let task = tables.tasks.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(title) = &changes.title {
            task.title = title.clone();
        }
        if let Some(description) = &changes.description {
            task.description = description.clone();
        }
        if let Some(status) = changes.status {
            task.status = status;
        }
        if let Some(priority) = changes.priority {
            task.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            task.due_date = due_date;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn set_task_assignee(&self, id: Uuid, assignee_id: Option<Uuid>) -> StoreResult<Task> {
        let mut tables = self.tables.lock().await;
        if let Some(user_id) = assignee_id {
            if !tables.users.contains_key(&user_id) {
                return Err(StoreError::MissingReference("user".into()));
            }
        }
        let task = tables.tasks.get_mut(&id).ok_or(StoreError::NotFound)?;
        task.assignee_id = assignee_id;
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        tables
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }
}
