use crate::{
    app::AppState,
    auth::{ActiveMembership, ProjectAccess},
    error::AppError,
    models::{AssignInput, Membership, NewTask, Role, Task, TaskInput, TaskQuery, TaskUpdate},
    store::Store,
};
use actix_web::{delete, get, patch, post, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

/// The `taskId` segment. Any `projectId` segment is read by the guard.
#[derive(Debug, Deserialize)]
pub struct TaskPath {
    #[serde(rename = "taskId")]
    pub task_id: Uuid,
}

/// Loads a task of the guarded project. Tasks of other projects are reported
/// as missing.
async fn project_task(
    store: &dyn Store,
    membership: &Membership,
    task_id: Uuid,
) -> Result<Task, AppError> {
    store
        .task_by_id(task_id)
        .await?
        .filter(|task| task.project_id == membership.project_id)
        .ok_or_else(|| AppError::NotFound("No task found with that ID".into()))
}

fn task_response(task: Task) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "task": task }
    }))
}

/// Sets the assignee. The assignee must be a member of the task's project.
async fn assign(
    store: &dyn Store,
    membership: &Membership,
    task_id: Uuid,
    assignee_id: Uuid,
) -> Result<Task, AppError> {
    let task = project_task(store, membership, task_id).await?;
    if store.membership(assignee_id, task.project_id).await?.is_none() {
        return Err(AppError::BadRequest(
            "Assignee must be a member of this project".into(),
        ));
    }

    let task = store.set_task_assignee(task.id, Some(assignee_id)).await?;
    log::info!("Task {} assigned to {}", task.id, assignee_id);
    Ok(task)
}

async fn unassign(
    store: &dyn Store,
    membership: &Membership,
    task_id: Uuid,
) -> Result<Task, AppError> {
    let task = project_task(store, membership, task_id).await?;
    Ok(store.set_task_assignee(task.id, None).await?)
}

/// Lists the project's tasks, newest first.
///
/// ## Query Parameters:
/// - `status` (optional): `TODO`, `IN_PROGRESS` or `DONE`.
/// - `priority` (optional): `LOW`, `MEDIUM` or `HIGH`.
/// - `assigneeId` (optional): only tasks assigned to this user.
/// - `search` (optional): case-insensitive match on title and description.
#[get("", wrap = "ProjectAccess::allow(&Role::ALL)")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    query_params: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    let tasks = state
        .store
        .project_tasks(membership.0.project_id, &query_params)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": tasks.len(),
        "data": { "tasks": tasks }
    })))
}

/// Creates a task in the project. New tasks start as `TODO`, unassigned.
#[post("", wrap = "ProjectAccess::allow(&Role::ALL)")]
pub async fn create_task(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let new_task = NewTask::new(
        task_data.into_inner(),
        membership.0.project_id,
        membership.0.user_id,
    );
    let task = state.store.insert_task(new_task).await?;

    Ok(HttpResponse::Created().json(json!({
        "status": "success",
        "data": { "task": task }
    })))
}

#[get("/{taskId}", wrap = "ProjectAccess::allow(&Role::ALL)")]
pub async fn get_task(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    path: web::Path<TaskPath>,
) -> Result<impl Responder, AppError> {
    let task = project_task(state.store.as_ref(), &membership.0, path.task_id).await?;
    Ok(task_response(task))
}

/// Updates a task. Only its creator may do so, whatever their role.
#[put("/{taskId}", wrap = "ProjectAccess::allow(&Role::ALL)")]
pub async fn update_task(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    path: web::Path<TaskPath>,
    task_data: web::Json<TaskUpdate>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;

    let task = project_task(state.store.as_ref(), &membership.0, path.task_id).await?;
    if task.created_by != membership.0.user_id {
        return Err(AppError::Forbidden(
            "Only the task creator can update this task".into(),
        ));
    }

    let task = state.store.update_task(task.id, &task_data).await?;
    Ok(task_response(task))
}

/// Deletes a task. Restricted to `OWNER`/`ADMIN`, who must also have created it.
#[delete("/{taskId}", wrap = "ProjectAccess::allow(&[Role::Owner, Role::Admin])")]
pub async fn delete_task(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    path: web::Path<TaskPath>,
) -> Result<impl Responder, AppError> {
    let task = project_task(state.store.as_ref(), &membership.0, path.task_id).await?;
    if task.created_by != membership.0.user_id {
        return Err(AppError::Forbidden(
            "Only the task creator can delete this task".into(),
        ));
    }

    state.store.delete_task(task.id).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Also mounted as `/tasks/{taskId}/assign`, where the guard takes the
/// project id from the body or the query string.
#[patch("/{taskId}/assign", wrap = "ProjectAccess::allow(&[Role::Owner, Role::Admin])")]
pub async fn assign_task(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    path: web::Path<TaskPath>,
    input: web::Json<AssignInput>,
) -> Result<impl Responder, AppError> {
    let task = assign(state.store.as_ref(), &membership.0, path.task_id, input.user_id).await?;
    Ok(task_response(task))
}

#[patch("/{taskId}/unassign", wrap = "ProjectAccess::allow(&[Role::Owner, Role::Admin])")]
pub async fn unassign_task(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    path: web::Path<TaskPath>,
) -> Result<impl Responder, AppError> {
    let task = unassign(state.store.as_ref(), &membership.0, path.task_id).await?;
    Ok(task_response(task))
}
