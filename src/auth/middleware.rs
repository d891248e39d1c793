use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use lazy_static::lazy_static;
use regex::Regex;
use std::rc::Rc;

use crate::app::AppState;
use crate::auth::extractors::CurrentUser;
use crate::error::AppError;
use crate::models::User;

/// Name of the session cookie.
pub const JWT_COOKIE: &str = "jwt";

lazy_static! {
    static ref BEARER_PREFIX: Regex = Regex::new(r"(?i)^bearer\s+").unwrap();
}

/// Picks the session token from the `Authorization` header, falling back to
/// the `jwt` cookie. The header wins when both are present.
pub fn extract_token(header: Option<&str>, cookie: Option<&str>) -> Option<String> {
    let from_header = header
        .map(str::trim)
        .filter(|value| BEARER_PREFIX.is_match(value))
        .and_then(|value| value.split_whitespace().last())
        .map(String::from);

    from_header.or_else(|| {
        cookie
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from)
    })
}

/// Verifies the token and loads the user it names.
async fn authenticate(state: &AppState, token: Option<String>) -> Result<User, AppError> {
    let token = token.ok_or_else(|| {
        AppError::Unauthorized("You are not logged in! Please log in to get access.".into())
    })?;
    let claims = state.tokens.verify(&token)?;

    state.store.user_by_id(claims.sub).await?.ok_or_else(|| {
        AppError::Unauthorized("The user belonging to this token does no longer exist.".into())
    })
}

/// Session gate. `protect` rejects requests without a valid session;
/// `is_logged_in` lets them through anonymously.
#[derive(Debug, Clone, Copy)]
pub struct Authentication {
    required: bool,
}

impl Authentication {
    pub fn protect() -> Self {
        Self { required: true }
    }

    pub fn is_logged_in() -> Self {
        Self { required: false }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = AuthenticationMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticationMiddleware {
            service: Rc::new(service),
            required: self.required,
        }))
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
    required: bool,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let required = self.required;

        let header = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok());
        let cookie = req.cookie(JWT_COOKIE);
        let token = extract_token(header, cookie.as_ref().map(|c| c.value()));
        let state = req.app_data::<web::Data<AppState>>().cloned();

        Box::pin(async move {
            let state = state.ok_or_else(|| {
                AppError::InternalServerError("Application state is not configured".into())
            })?;

            match authenticate(&state, token).await {
                Ok(user) => {
                    req.extensions_mut().insert(CurrentUser(user));
                }
                Err(err) if required => {
                    log::debug!("Rejected {} {}: {}", req.method(), req.path(), err);
                    return Err(err.into());
                }
                Err(err) => log::debug!("Continuing anonymously: {}", err),
            }

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_from_header() {
        assert_eq!(
            extract_token(Some("Bearer abc.def.ghi"), None),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            extract_token(Some("bearer   abc.def.ghi  "), None),
            Some("abc.def.ghi".to_string())
        );
        assert_eq!(
            extract_token(Some("Bearer Bearer abc.def.ghi"), None),
            Some("abc.def.ghi".to_string())
        );
    }

    #[test]
    fn test_header_wins_over_cookie() {
        assert_eq!(
            extract_token(Some("Bearer from-header"), Some("from-cookie")),
            Some("from-header".to_string())
        );
    }

    #[test]
    fn test_cookie_fallback() {
        assert_eq!(
            extract_token(None, Some("from-cookie")),
            Some("from-cookie".to_string())
        );
        assert_eq!(
            extract_token(Some("Basic dXNlcjpwYXNz"), Some("from-cookie")),
            Some("from-cookie".to_string())
        );
        assert_eq!(extract_token(Some("Bearer"), None), None);
        assert_eq!(extract_token(None, Some("")), None);
        assert_eq!(extract_token(None, None), None);
    }
}
