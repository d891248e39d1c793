use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::extractors::{ActiveMembership, CurrentUser};
use crate::error::AppError;
use crate::models::{Membership, Role, RoleSet};
use crate::store::Store;

/// Name of the path segment, body field and query parameter carrying the project id.
pub const PROJECT_ID: &str = "projectId";

/// Largest JSON body the guard buffers while looking for a project id.
const MAX_PEEK_BYTES: usize = 64 * 1024;

/// Picks the project id from the path, then the body, then the query string.
/// The first non-empty candidate wins and must be a UUID.
pub fn resolve_project_id(
    path: Option<&str>,
    body: Option<&str>,
    query: Option<&str>,
) -> Result<Uuid, AppError> {
    let candidate = [path, body, query]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .ok_or_else(|| AppError::BadRequest("Project ID is required".into()))?;

    Uuid::parse_str(candidate)
        .map_err(|_| AppError::BadRequest(format!("Invalid project ID: {}", candidate)))
}

/// Loads the caller's membership and checks its role against `allowed`.
pub async fn check_project_access(
    store: &dyn Store,
    user_id: Uuid,
    project_id: Uuid,
    allowed: RoleSet,
) -> Result<Membership, AppError> {
    let membership = store
        .membership(user_id, project_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("You are not a member of this project".into()))?;

    if !allowed.admits(membership.role) {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".into(),
        ));
    }
    Ok(membership)
}

/// The `projectId` field of a JSON body, as text. Non-string values are kept
/// verbatim so they fail UUID parsing.
fn body_project_id(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get(PROJECT_ID)? {
        Value::Null => None,
        Value::String(id) => Some(id.clone()),
        other => Some(other.to_string()),
    }
}

/// Reads the whole request body and puts an identical copy back.
async fn peek_body(req: &mut ServiceRequest) -> Result<web::Bytes, AppError> {
    let mut payload = req.take_payload();
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))?;
        if body.len() + chunk.len() > MAX_PEEK_BYTES {
            return Err(AppError::BadRequest("Request body is too large".into()));
        }
        body.extend_from_slice(&chunk);
    }

    let body = body.freeze();
    let (_, mut restored) = actix_http::h1::Payload::create(true);
    restored.unread_data(body.clone());
    req.set_payload(Payload::from(restored));
    Ok(body)
}

/// Per-route membership guard. Must run inside `Authentication::protect()`.
#[derive(Debug, Clone, Copy)]
pub struct ProjectAccess {
    roles: RoleSet,
}

impl ProjectAccess {
    /// Admits members whose role is listed. Roles imply nothing about each other.
    pub fn allow(roles: &[Role]) -> Self {
        Self {
            roles: RoleSet::of(roles),
        }
    }

    pub fn any_member() -> Self {
        Self {
            roles: RoleSet::empty(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ProjectAccess
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = ProjectAccessMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ProjectAccessMiddleware {
            service: Rc::new(service),
            roles: self.roles,
        }))
    }
}

pub struct ProjectAccessMiddleware<S> {
    service: Rc<S>,
    roles: RoleSet,
}

impl<S, B> Service<ServiceRequest> for ProjectAccessMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let roles = self.roles;

        Box::pin(async move {
            let user = req
                .extensions()
                .get::<CurrentUser>()
                .map(|current| current.0.id)
                .ok_or_else(|| {
                    AppError::Unauthorized(
                        "You are not logged in! Please log in to get access.".into(),
                    )
                })?;
            let state = req
                .app_data::<web::Data<AppState>>()
                .cloned()
                .ok_or_else(|| {
                    AppError::InternalServerError("Application state is not configured".into())
                })?;

            let path_id = req.match_info().get(PROJECT_ID).map(String::from);
            let body_id = if path_id.is_none() && req.content_type() == "application/json" {
                let body = peek_body(&mut req).await?;
                body_project_id(&body)
            } else {
                None
            };
            let query_id = web::Query::<HashMap<String, String>>::from_query(req.query_string())
                .ok()
                .and_then(|query| query.into_inner().remove(PROJECT_ID));

            let project_id = resolve_project_id(
                path_id.as_deref(),
                body_id.as_deref(),
                query_id.as_deref(),
            )?;
            let membership =
                check_project_access(state.store.as_ref(), user, project_id, roles).await?;

            req.extensions_mut().insert(ActiveMembership(membership));
            service.call(req).await
        })
    }
}
