use crate::{
    app::AppState,
    auth::{ActiveMembership, ProjectAccess},
    error::AppError,
    models::{AddMemberInput, MemberTarget, Role},
    registry,
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

#[get("", wrap = "ProjectAccess::any_member()")]
pub async fn list_members(
    state: web::Data<AppState>,
    membership: ActiveMembership,
) -> Result<impl Responder, AppError> {
    let members = registry::list_members(state.store.as_ref(), &membership.0).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "results": members.len(),
        "data": { "members": members }
    })))
}

/// Adds a registered user, looked up by email, as a `MEMBER`.
#[post("/add", wrap = "ProjectAccess::allow(&[Role::Owner, Role::Admin])")]
pub async fn add_member(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    input: web::Json<AddMemberInput>,
) -> Result<impl Responder, AppError> {
    input.validate()?;

    let added = registry::add_member(state.store.as_ref(), &membership.0, &input.email).await?;
    Ok(HttpResponse::Created().json(json!({
        "status": "success",
        "data": { "membership": added }
    })))
}

#[delete("/remove", wrap = "ProjectAccess::allow(&[Role::Owner, Role::Admin])")]
pub async fn remove_member(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    target: web::Json<MemberTarget>,
) -> Result<impl Responder, AppError> {
    registry::remove_member(state.store.as_ref(), &membership.0, target.user_id).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[patch("/role/makeAdmin", wrap = "ProjectAccess::allow(&[Role::Owner, Role::Admin])")]
pub async fn make_admin(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    target: web::Json<MemberTarget>,
) -> Result<impl Responder, AppError> {
    let updated = registry::promote(state.store.as_ref(), &membership.0, target.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "membership": updated }
    })))
}

#[patch("/role/remove-admin", wrap = "ProjectAccess::allow(&[Role::Owner, Role::Admin])")]
pub async fn remove_admin(
    state: web::Data<AppState>,
    membership: ActiveMembership,
    target: web::Json<MemberTarget>,
) -> Result<impl Responder, AppError> {
    let updated = registry::demote(state.store.as_ref(), &membership.0, target.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "data": { "membership": updated }
    })))
}
