use crate::{
    app::AppState,
    auth::{Authentication, CurrentUser, MaybeUser},
    error::AppError,
    models::{ProfileChanges, PublicUser, UserProfile},
};
use actix_web::{delete, get, patch, web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

fn require_self(current: &CurrentUser, id: Uuid, action: &str) -> Result<(), AppError> {
    if current.0.id != id {
        return Err(AppError::Forbidden(format!(
            "You can only {} your own account",
            action
        )));
    }
    Ok(())
}

#[get("", wrap = "Authentication::protect()")]
pub async fn list_users(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let users: Vec<PublicUser> = state
        .store
        .list_users()
        .await?
        .into_iter()
        .map(PublicUser::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": users.len(),
        "data": { "users": users }
    })))
}

/// The caller's own profile with the projects they belong to.
///
/// Runs behind the optional gate, so an anonymous caller reaches the
/// handler and gets a 401 from here.
#[get("/me", wrap = "Authentication::is_logged_in()")]
pub async fn me(state: web::Data<AppState>, user: MaybeUser) -> Result<impl Responder, AppError> {
    let user = user.0.ok_or_else(|| {
        AppError::Unauthorized("You are not logged in! Please log in to get access.".into())
    })?;

    let memberships = state.store.projects_for_user(user.id).await?;
    let profile = UserProfile {
        user: user.into(),
        memberships,
    };
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "user": profile }
    })))
}

#[get("/{id}", wrap = "Authentication::protect()")]
pub async fn get_user(
    state: web::Data<AppState>,
    id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let user = state
        .store
        .user_by_id(id.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("No user found with that ID".into()))?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "user": PublicUser::from(user) }
    })))
}

/// Updates name and email. Password fields are not accepted here.
#[patch("/{id}", wrap = "Authentication::protect()")]
pub async fn update_user(
    state: web::Data<AppState>,
    current: CurrentUser,
    id: web::Path<Uuid>,
    changes: web::Json<ProfileChanges>,
) -> Result<impl Responder, AppError> {
    let id = id.into_inner();
    require_self(&current, id, "update")?;
    changes.validate()?;

    let user = state.store.update_profile(id, &changes).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "user": PublicUser::from(user) }
    })))
}

#[delete("/{id}", wrap = "Authentication::protect()")]
pub async fn delete_user(
    state: web::Data<AppState>,
    current: CurrentUser,
    id: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let id = id.into_inner();
    require_self(&current, id, "delete")?;

    state.store.delete_user(id).await?;
    log::info!("User {} deleted their account", id);
    Ok(HttpResponse::NoContent().finish())
}
