//! Project membership registry.
//!
//! Every operation receives the actor's membership as resolved by
//! `ProjectAccess` and checks the actor's role again before writing, so the
//! rules hold no matter how a route is guarded.

use uuid::Uuid;

use crate::error::AppError;
use crate::models::project::dates_out_of_order;
use crate::models::{
    Membership, NewProject, Project, ProjectChanges, ProjectInput, ProjectMember, Role, RoleSet,
};
use crate::store::{Store, StoreError};

const MANAGERS: [Role; 2] = [Role::Owner, Role::Admin];

fn require(actor: &Membership, allowed: &[Role]) -> Result<(), AppError> {
    if RoleSet::of(allowed).contains(actor.role) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "You do not have permission to perform this action".into(),
        ))
    }
}

/// The target's membership in the actor's project, which must not be the owner's.
async fn non_owner_target(
    store: &dyn Store,
    actor: &Membership,
    target_id: Uuid,
    refusal: &str,
) -> Result<Membership, AppError> {
    let target = store
        .membership(target_id, actor.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Target member not found".into()))?;

    if target.role == Role::Owner {
        return Err(AppError::Forbidden(refusal.to_string()));
    }
    Ok(target)
}

/// Creates the project with its creator as `OWNER`.
pub async fn create_project(
    store: &dyn Store,
    creator_id: Uuid,
    input: ProjectInput,
) -> Result<(Project, Membership), AppError> {
    let (project, owner) = store
        .create_project(NewProject::new(input, creator_id))
        .await?;
    log::info!("Project {} created by {}", project.id, creator_id);
    Ok((project, owner))
}

/// Partial update by an `OWNER` or `ADMIN`. The merged dates must stay ordered.
pub async fn update_project(
    store: &dyn Store,
    actor: &Membership,
    changes: ProjectChanges,
) -> Result<Project, AppError> {
    require(actor, &MANAGERS)?;

    let current = store
        .project_by_id(actor.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No project found with that ID".into()))?;
    let merged = changes.apply_to(&current);
    if dates_out_of_order(merged.start_date, merged.end_date) {
        return Err(AppError::ValidationError(
            "Start date must be before end date".into(),
        ));
    }

    let project = store.update_project(actor.project_id, &changes).await?;
    log::info!("Project {} updated by {}", project.id, actor.user_id);
    Ok(project)
}

/// Deletes the project with all its memberships and tasks. `OWNER` only.
pub async fn delete_project(store: &dyn Store, actor: &Membership) -> Result<(), AppError> {
    require(actor, &[Role::Owner])?;

    store.delete_project(actor.project_id).await.map_err(|e| match e {
        StoreError::NotFound => AppError::NotFound("No project found with that ID".into()),
        other => other.into(),
    })?;
    log::info!("Project {} deleted by {}", actor.project_id, actor.user_id);
    Ok(())
}

/// Adds the user registered under `email` as a `MEMBER`.
pub async fn add_member(
    store: &dyn Store,
    actor: &Membership,
    email: &str,
) -> Result<Membership, AppError> {
    require(actor, &MANAGERS)?;

    let user = store
        .user_by_email(email)
        .await?
        .ok_or_else(|| AppError::NotFound("No user found with that email".into()))?;

    if store.membership(user.id, actor.project_id).await?.is_some() {
        return Err(AppError::Conflict("User is already a member".into()));
    }

    let membership = store
        .insert_membership(user.id, actor.project_id, Role::Member)
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(_) => AppError::Conflict("User is already a member".into()),
            other => other.into(),
        })?;
    log::info!(
        "User {} added to project {} by {}",
        user.id,
        actor.project_id,
        actor.user_id
    );
    Ok(membership)
}

/// Removes a non-owner member.
pub async fn remove_member(
    store: &dyn Store,
    actor: &Membership,
    target_id: Uuid,
) -> Result<(), AppError> {
    require(actor, &MANAGERS)?;
    non_owner_target(store, actor, target_id, "Cannot remove the project OWNER").await?;

    store.delete_membership(target_id, actor.project_id).await?;
    log::info!(
        "User {} removed from project {} by {}",
        target_id,
        actor.project_id,
        actor.user_id
    );
    Ok(())
}

/// Makes a non-owner member an `ADMIN`. Promoting an admin changes nothing.
pub async fn promote(
    store: &dyn Store,
    actor: &Membership,
    target_id: Uuid,
) -> Result<Membership, AppError> {
    require(actor, &MANAGERS)?;
    let target = non_owner_target(store, actor, target_id, "Cannot promote/demote OWNER").await?;
    if target.role == Role::Admin {
        return Ok(target);
    }

    let membership = store
        .set_member_role(target_id, actor.project_id, Role::Admin)
        .await?;
    log::info!("User {} promoted in project {}", target_id, actor.project_id);
    Ok(membership)
}

/// Makes a non-owner member a plain `MEMBER`.
pub async fn demote(
    store: &dyn Store,
    actor: &Membership,
    target_id: Uuid,
) -> Result<Membership, AppError> {
    require(actor, &MANAGERS)?;
    let target = non_owner_target(store, actor, target_id, "Cannot promote/demote OWNER").await?;
    if target.role == Role::Member {
        return Ok(target);
    }

    let membership = store
        .set_member_role(target_id, actor.project_id, Role::Member)
        .await?;
    log::info!("User {} demoted in project {}", target_id, actor.project_id);
    Ok(membership)
}

pub async fn list_members(
    store: &dyn Store,
    actor: &Membership,
) -> Result<Vec<ProjectMember>, AppError> {
    Ok(store.project_members(actor.project_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTask, NewUser, TaskPriority, User};
    use crate::store::MemoryStore;
    use chrono::{Duration, Utc};

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .insert_user(NewUser {
                name: email.to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap()
    }

    fn alpha() -> ProjectInput {
        ProjectInput {
            name: "Alpha".to_string(),
            description: "First project".to_string(),
            start_date: None,
            end_date: None,
        }
    }

    async fn membership(store: &MemoryStore, user: &User, project: &Project) -> Membership {
        store.membership(user.id, project.id).await.unwrap().unwrap()
    }

    #[actix_rt::test]
    async fn test_creator_is_sole_owner() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;

        let (project, owner) = create_project(&store, a.id, alpha()).await.unwrap();

        assert_eq!(owner.role, Role::Owner);
        assert_eq!(owner.user_id, a.id);
        assert_eq!(store.membership_count(project.id).await, 1);
    }

    #[actix_rt::test]
    async fn test_membership_scenario() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        let (project, owner) = create_project(&store, a.id, alpha()).await.unwrap();

        let added = add_member(&store, &owner, "b@example.com").await.unwrap();
        assert_eq!(added.role, Role::Member);

        let again = add_member(&store, &owner, "b@example.com").await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(store.membership_count(project.id).await, 2);

        let promoted = promote(&store, &owner, b.id).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);

        let b_membership = membership(&store, &b, &project).await;
        assert!(matches!(
            promote(&store, &b_membership, a.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            remove_member(&store, &b_membership, a.id).await,
            Err(AppError::Forbidden(_))
        ));
        assert_eq!(membership(&store, &a, &project).await.role, Role::Owner);
    }

    #[actix_rt::test]
    async fn test_promote_is_idempotent_and_demote_reverts() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        let (project, owner) = create_project(&store, a.id, alpha()).await.unwrap();
        add_member(&store, &owner, "b@example.com").await.unwrap();

        promote(&store, &owner, b.id).await.unwrap();
        let twice = promote(&store, &owner, b.id).await.unwrap();
        assert_eq!(twice.role, Role::Admin);

        let demoted = demote(&store, &owner, b.id).await.unwrap();
        assert_eq!(demoted.role, Role::Member);
        assert_eq!(membership(&store, &b, &project).await.role, Role::Member);

        assert!(matches!(
            demote(&store, &owner, a.id).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[actix_rt::test]
    async fn test_members_cannot_manage_members() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        user(&store, "c@example.com").await;
        let (project, owner) = create_project(&store, a.id, alpha()).await.unwrap();
        add_member(&store, &owner, "b@example.com").await.unwrap();
        let b_membership = membership(&store, &b, &project).await;

        assert!(matches!(
            add_member(&store, &b_membership, "c@example.com").await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            delete_project(&store, &b_membership).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[actix_rt::test]
    async fn test_unknown_targets() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let (_, owner) = create_project(&store, a.id, alpha()).await.unwrap();

        assert!(matches!(
            add_member(&store, &owner, "nobody@example.com").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            promote(&store, &owner, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            remove_member(&store, &owner, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[actix_rt::test]
    async fn test_admin_removes_member_but_not_delete_project() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        let c = user(&store, "c@example.com").await;
        let (project, owner) = create_project(&store, a.id, alpha()).await.unwrap();
        add_member(&store, &owner, "b@example.com").await.unwrap();
        add_member(&store, &owner, "c@example.com").await.unwrap();
        promote(&store, &owner, b.id).await.unwrap();
        let admin = membership(&store, &b, &project).await;

        remove_member(&store, &admin, c.id).await.unwrap();
        assert!(store.membership(c.id, project.id).await.unwrap().is_none());

        assert!(matches!(
            delete_project(&store, &admin).await,
            Err(AppError::Forbidden(_))
        ));

        delete_project(&store, &owner).await.unwrap();
        assert_eq!(store.membership_count(project.id).await, 0);
    }

    #[actix_rt::test]
    async fn test_removed_member_is_unassigned_from_project_tasks() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let b = user(&store, "b@example.com").await;
        let (alpha_project, alpha_owner) = create_project(&store, a.id, alpha()).await.unwrap();
        let mut beta = alpha();
        beta.name = "Beta".to_string();
        let (beta_project, beta_owner) = create_project(&store, a.id, beta).await.unwrap();
        add_member(&store, &alpha_owner, "b@example.com").await.unwrap();
        add_member(&store, &beta_owner, "b@example.com").await.unwrap();

        let mut assigned = Vec::new();
        for project in [&alpha_project, &beta_project] {
            let task = store
                .insert_task(NewTask {
                    title: "Review".to_string(),
                    description: None,
                    priority: TaskPriority::Medium,
                    due_date: None,
                    project_id: project.id,
                    created_by: a.id,
                })
                .await
                .unwrap();
            store.set_task_assignee(task.id, Some(b.id)).await.unwrap();
            assigned.push(task.id);
        }

        remove_member(&store, &alpha_owner, b.id).await.unwrap();

        let alpha_task = store.task_by_id(assigned[0]).await.unwrap().unwrap();
        assert_eq!(alpha_task.assignee_id, None);
        let beta_task = store.task_by_id(assigned[1]).await.unwrap().unwrap();
        assert_eq!(beta_task.assignee_id, Some(b.id));
    }

    #[actix_rt::test]
    async fn test_update_project_checks_merged_dates() {
        let store = MemoryStore::new();
        let a = user(&store, "a@example.com").await;
        let now = Utc::now();
        let mut input = alpha();
        input.start_date = Some(now);
        input.end_date = Some(now + Duration::days(10));
        let (_, owner) = create_project(&store, a.id, input).await.unwrap();

        let backwards = ProjectChanges {
            end_date: Some(Some(now - Duration::days(1))),
            ..Default::default()
        };
        assert!(matches!(
            update_project(&store, &owner, backwards).await,
            Err(AppError::ValidationError(_))
        ));

        let renamed = ProjectChanges {
            name: Some("Beta".to_string()),
            ..Default::default()
        };
        let project = update_project(&store, &owner, renamed).await.unwrap();
        assert_eq!(project.name, "Beta");
        assert_eq!(project.start_date, Some(now));
    }
}
