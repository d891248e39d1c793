use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::config::DatabaseConfig;
use crate::models::{
    Membership, NewProject, NewTask, NewUser, PasswordReset, ProfileChanges, Project,
    ProjectChanges, ProjectMember, ProjectSummary, Role, Task, TaskQuery, TaskUpdate, User,
};

const USER_COLUMNS: &str = "id, name, email, password_hash, password_reset_token, \
     password_reset_expires, created_at, updated_at";

const PROJECT_COLUMNS: &str =
    "id, name, description, start_date, end_date, creator_id, created_at, updated_at";

const MEMBERSHIP_COLUMNS: &str = "user_id, project_id, role, created_at";

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_date, project_id, \
     created_by, assignee_id, created_at, updated_at";

/// Maps a constraint name to the field reported in duplicate errors.
fn constraint_field(constraint: Option<&str>) -> String {
    match constraint {
        Some("users_email_key") => "email".to_string(),
        Some("memberships_pkey") => "membership".to_string(),
        Some(other) => other.to_string(),
        None => "unknown".to_string(),
    }
}

/// Maps a foreign-key constraint name to the referenced entity.
fn referenced_entity(constraint: Option<&str>) -> String {
    match constraint {
        Some(name) if name.contains("project_id") => "project".to_string(),
        Some(_) => "user".to_string(),
        None => "record".to_string(),
    }
}

/// Escapes `ILIKE` metacharacters so the search text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> StoreError {
        match &error {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::Duplicate(constraint_field(db_err.constraint()))
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                StoreError::MissingReference(referenced_entity(db_err.constraint()))
            }
            _ => StoreError::Database(error.to_string()),
        }
    }
}

/// PostgreSQL adapter over an `sqlx` connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the migrations under `migrations/`.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash) VALUES ($1, $2, $3, $4) \
             RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.name)
            .bind(user.email)
            .bind(user.password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn user_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE password_reset_token = $1 AND password_reset_expires > $2",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at", USER_COLUMNS);
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_profile(&self, id: Uuid, changes: &ProfileChanges) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET name = COALESCE($2, name), email = COALESCE($3, email), \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.email)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_password(&self, id: Uuid, password_hash: &str) -> StoreResult<User> {
        let sql = format!(
            "UPDATE users SET password_hash = $2, password_reset_token = NULL, \
             password_reset_expires = NULL, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn set_password_reset(&self, id: Uuid, reset: Option<PasswordReset>) -> StoreResult<()> {
        let (token_hash, expires_at) = match reset {
            Some(reset) => (Some(reset.token_hash), Some(reset.expires_at)),
            None => (None, None),
        };
        let result = sqlx::query(
            "UPDATE users SET password_reset_token = $2, password_reset_expires = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<()> {
        // Foreign keys cascade to projects, memberships and created tasks.
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<(Project, Membership)> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO projects (id, name, description, start_date, end_date, creator_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            PROJECT_COLUMNS
        );
        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(Uuid::new_v4())
            .bind(project.name)
            .bind(project.description)
            .bind(project.start_date)
            .bind(project.end_date)
            .bind(project.creator_id)
            .fetch_one(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO memberships (user_id, project_id, role) VALUES ($1, $2, $3) RETURNING {}",
            MEMBERSHIP_COLUMNS
        );
        let owner = sqlx::query_as::<_, Membership>(&sql)
            .bind(project.creator_id)
            .bind(project.id)
            .bind(Role::Owner)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok((project, owner))
    }

    async fn project_by_id(&self, id: Uuid) -> StoreResult<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE id = $1", PROJECT_COLUMNS);
        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn projects_for_user(&self, user_id: Uuid) -> StoreResult<Vec<ProjectSummary>> {
        let projects = sqlx::query_as::<_, ProjectSummary>(
            "SELECT p.id, p.name, p.description, p.start_date, p.end_date, p.creator_id, \
             p.created_at, p.updated_at, m.role \
             FROM projects p JOIN memberships m ON m.project_id = p.id \
             WHERE m.user_id = $1 ORDER BY p.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    async fn update_project(&self, id: Uuid, changes: &ProjectChanges) -> StoreResult<Project> {
        // Clearable columns take a "present" flag followed by the new value.
        let sql = format!(
            "UPDATE projects SET name = COALESCE($2, name), \
             description = COALESCE($3, description), \
             start_date = CASE WHEN $4 THEN $5 ELSE start_date END, \
             end_date = CASE WHEN $6 THEN $7 ELSE end_date END, \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            PROJECT_COLUMNS
        );
        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.description)
            .bind(changes.start_date.is_some())
            .bind(changes.start_date.flatten())
            .bind(changes.end_date.is_some())
            .bind(changes.end_date.flatten())
            .fetch_one(&self.pool)
            .await?;
        Ok(project)
    }

    async fn delete_project(&self, id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tasks WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM memberships WHERE project_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }

    async fn membership(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<Option<Membership>> {
        let sql = format!(
            "SELECT {} FROM memberships WHERE user_id = $1 AND project_id = $2",
            MEMBERSHIP_COLUMNS
        );
        let membership = sqlx::query_as::<_, Membership>(&sql)
            .bind(user_id)
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(membership)
    }

    async fn insert_membership(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        role: Role,
    ) -> StoreResult<Membership> {
        let sql = format!(
            "INSERT INTO memberships (user_id, project_id, role) VALUES ($1, $2, $3) RETURNING {}",
            MEMBERSHIP_COLUMNS
        );
        let membership = sqlx::query_as::<_, Membership>(&sql)
            .bind(user_id)
            .bind(project_id)
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(membership)
    }

    async fn set_member_role(
        &self,
        user_id: Uuid,
        project_id: Uuid,
        role: Role,
    ) -> StoreResult<Membership> {
        let sql = format!(
            "UPDATE memberships SET role = $3 WHERE user_id = $1 AND project_id = $2 RETURNING {}",
            MEMBERSHIP_COLUMNS
        );
        let membership = sqlx::query_as::<_, Membership>(&sql)
            .bind(user_id)
            .bind(project_id)
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        Ok(membership)
    }

    async fn delete_membership(&self, user_id: Uuid, project_id: Uuid) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM memberships WHERE user_id = $1 AND project_id = $2")
            .bind(user_id)
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound);
        }

        sqlx::query(
            "UPDATE tasks SET assignee_id = NULL, updated_at = NOW() \
             WHERE project_id = $1 AND assignee_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn project_members(&self, project_id: Uuid) -> StoreResult<Vec<ProjectMember>> {
        let members = sqlx::query_as::<_, ProjectMember>(
            "SELECT u.id AS user_id, u.name, u.email, m.role, m.created_at AS joined_at \
             FROM memberships m JOIN users u ON u.id = m.user_id \
             WHERE m.project_id = $1 ORDER BY m.created_at",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn insert_task(&self, task: NewTask) -> StoreResult<Task> {
        let sql = format!(
            "INSERT INTO tasks (id, title, description, priority, due_date, project_id, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(Uuid::new_v4())
            .bind(task.title)
            .bind(task.description)
            .bind(task.priority)
            .bind(task.due_date)
            .bind(task.project_id)
            .bind(task.created_by)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn task_by_id(&self, id: Uuid) -> StoreResult<Option<Task>> {
        let sql = format!("SELECT {} FROM tasks WHERE id = $1", TASK_COLUMNS);
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(task)
    }

    async fn project_tasks(&self, project_id: Uuid, filter: &TaskQuery) -> StoreResult<Vec<Task>> {
        // Conditions for status, priority, assignee and search are appended as present.
        let mut sql = format!("SELECT {} FROM tasks WHERE project_id = $1", TASK_COLUMNS);
        let mut param_count = 2;

        if filter.status.is_some() {
            sql.push_str(&format!(" AND status = ${}", param_count));
            param_count += 1;
        }
        if filter.priority.is_some() {
            sql.push_str(&format!(" AND priority = ${}", param_count));
            param_count += 1;
        }
        if filter.assignee_id.is_some() {
            sql.push_str(&format!(" AND assignee_id = ${}", param_count));
            param_count += 1;
        }
        let search = filter.search.as_deref().filter(|s| !s.is_empty());
        if search.is_some() {
            sql.push_str(&format!(
                " AND (title ILIKE ${0} ESCAPE '\\' OR description ILIKE ${0} ESCAPE '\\')",
                param_count
            ));
        }
        sql.push_str(" ORDER BY created_at DESC");

        let mut query = sqlx::query_as::<_, Task>(&sql).bind(project_id);
        if let Some(status) = filter.status {
            query = query.bind(status);
        }
        if let Some(priority) = filter.priority {
            query = query.bind(priority);
        }
        if let Some(assignee_id) = filter.assignee_id {
            query = query.bind(assignee_id);
        }
        if let Some(search) = search {
            query = query.bind(format!("%{}%", escape_like(search)));
        }

        let tasks = query.fetch_all(&self.pool).await?;
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, changes: &TaskUpdate) -> StoreResult<Task> {
        let sql = format!(
            "UPDATE tasks SET title = COALESCE($2, title), \
             description = CASE WHEN $3 THEN $4 ELSE description END, \
             status = COALESCE($5, status), \
             priority = COALESCE($6, priority), \
             due_date = CASE WHEN $7 THEN $8 ELSE due_date END, \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(&changes.title)
            .bind(changes.description.is_some())
            .bind(changes.description.clone().flatten())
            .bind(changes.status)
            .bind(changes.priority)
            .bind(changes.due_date.is_some())
            .bind(changes.due_date.flatten())
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn set_task_assignee(&self, id: Uuid, assignee_id: Option<Uuid>) -> StoreResult<Task> {
        let sql = format!(
            "UPDATE tasks SET assignee_id = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            TASK_COLUMNS
        );
        let task = sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(assignee_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(task)
    }

    async fn delete_task(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_names_map_to_fields() {
        assert_eq!(constraint_field(Some("users_email_key")), "email");
        assert_eq!(constraint_field(Some("memberships_pkey")), "membership");
        assert_eq!(referenced_entity(Some("tasks_project_id_fkey")), "project");
        assert_eq!(referenced_entity(Some("memberships_user_id_fkey")), "user");
    }

    #[test]
    fn test_search_text_is_escaped() {
        assert_eq!(escape_like("Initial Setup"), "Initial Setup");
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("C:\\temp"), "C:\\\\temp");
    }
}
