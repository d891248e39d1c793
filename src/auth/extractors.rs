use actix_web::dev::Payload;
use actix_web::{Error as ActixError, FromRequest, HttpMessage, HttpRequest};
use std::future::{ready, Ready};

use crate::error::AppError;
use crate::models::{Membership, User};

/// The user attached by `Authentication`.
///
/// Fails with `AppError::Unauthorized` when the request went through no gate
/// or the optional gate found no valid session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequest for CurrentUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<CurrentUser>().cloned() {
            Some(user) => ready(Ok(user)),
            None => {
                let err = AppError::Unauthorized(
                    "You are not logged in! Please log in to get access.".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}

/// The user attached by `Authentication::is_logged_in`, if any. Never fails.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequest for MaybeUser {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req.extensions().get::<CurrentUser>().map(|u| u.0.clone());
        ready(Ok(MaybeUser(user)))
    }
}

/// The caller's membership in the project resolved by `ProjectAccess`.
#[derive(Debug, Clone)]
pub struct ActiveMembership(pub Membership);

impl FromRequest for ActiveMembership {
    type Error = ActixError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        match req.extensions().get::<ActiveMembership>().cloned() {
            Some(membership) => ready(Ok(membership)),
            None => {
                let err = AppError::InternalServerError(
                    "Project membership was not resolved for this route".to_string(),
                );
                ready(Err(err.into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use chrono::Utc;
    use uuid::Uuid;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "hash".to_string(),
            password_reset_token: None,
            password_reset_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[actix_rt::test]
    async fn test_current_user_extractor_success() {
        let req = test::TestRequest::default().to_http_request();
        let alice = user();
        req.extensions_mut().insert(CurrentUser(alice.clone()));

        let mut payload = Payload::None;
        let extracted = CurrentUser::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(extracted.0.id, alice.id);

        let maybe = MaybeUser::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(maybe.0.map(|u| u.id), Some(alice.id));
    }

    #[actix_rt::test]
    async fn test_current_user_extractor_failure() {
        let req = test::TestRequest::default().to_http_request();

        let mut payload = Payload::None;
        let err = CurrentUser::from_request(&req, &mut payload).await.unwrap_err();
        assert_eq!(err.error_response().status(), StatusCode::UNAUTHORIZED);

        let maybe = MaybeUser::from_request(&req, &mut payload).await.unwrap();
        assert!(maybe.0.is_none());
    }

    #[actix_rt::test]
    async fn test_active_membership_extractor() {
        let req = test::TestRequest::default().to_http_request();
        let mut payload = Payload::None;
        assert!(ActiveMembership::from_request(&req, &mut payload).await.is_err());

        let membership = Membership {
            user_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            role: Role::Admin,
            created_at: Utc::now(),
        };
        req.extensions_mut().insert(ActiveMembership(membership.clone()));
        let extracted = ActiveMembership::from_request(&req, &mut payload).await.unwrap();
        assert_eq!(extracted.0, membership);
    }
}
