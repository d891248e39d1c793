use crate::{
    app::AppState,
    auth::{ActiveMembership, CurrentUser, ProjectAccess},
    error::AppError,
    models::{ProjectChanges, ProjectInput, Role},
    registry,
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

/// Projects the caller belongs to, each with the caller's role.
#[get("")]
pub async fn list_projects(
    state: web::Data<AppState>,
    current: CurrentUser,
) -> Result<impl Responder, AppError> {
    let projects = state.store.projects_for_user(current.0.id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": projects.len(),
        "data": { "projects": projects }
    })))
}

/// Creates a project owned by the caller.
///
/// ## Responses:
/// - `201 Created`: the project and the caller's `OWNER` membership.
/// - `400 Bad Request`: missing name/description or start date not before end date.
#[post("")]
pub async fn create_project(
    state: web::Data<AppState>,
    current: CurrentUser,
    input: web::Json<ProjectInput>,
) -> Result<impl Responder, AppError> {
    input.validate()?;

    let (project, membership) =
        registry::create_project(state.store.as_ref(), current.0.id, input.into_inner()).await?;
    Ok(HttpResponse::Created().json(json!({
        "status": "success",
        "data": { "project": project, "membership": membership }
    })))
}

#[get("/{projectId}", wrap = "ProjectAccess::any_member()")]
pub async fn get_project(
    state: web::Data<AppState>,
    membership: ActiveMembership,
) -> Result<impl Responder, AppError> {
    let project = state
        .store
        .project_by_id(membership.0.project_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No project found with that ID".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "project": project, "role": membership.0.role }
    })))
}

#[patch("/{projectId}", wrap = "ProjectAccess::allow(&[Role::Owner, Role::Admin])")]
pub async fn update_project(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    changes: web::Json<ProjectChanges>,
) -> Result<impl Responder, AppError> {
    changes.validate()?;

    let project =
        registry::update_project(state.store.as_ref(), &membership.0, changes.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "project": project }
    })))
}

#[delete("/{projectId}", wrap = "ProjectAccess::allow(&[Role::Owner])")]
pub async fn delete_project(
    state: web::Data<AppState>,
    membership: ActiveMembership,
) -> Result<impl Responder, AppError> {
    registry::delete_project(state.store.as_ref(), &membership.0).await?;
    Ok(HttpResponse::NoContent().finish())
}
