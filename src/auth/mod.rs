pub mod extractors;
pub mod middleware;
pub mod password;
pub mod project_access;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::PublicUser;

// Re-export necessary items
pub use extractors::{ActiveMembership, CurrentUser, MaybeUser};
pub use middleware::{extract_token, Authentication, JWT_COOKIE};
pub use password::{generate_reset_token, hash_password, hash_reset_token, verify_password};
pub use project_access::{check_project_access, resolve_project_id, ProjectAccess};
pub use token::{Claims, TokenService};

/// Represents the payload for a new user signup request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Must be a valid email format.
    #[validate(email)]
    pub email: String,
    /// Must be at least 8 characters long.
    #[validate(length(min = 8))]
    pub password: String,
    /// Must repeat `password`.
    #[validate(must_match = "password")]
    pub password_confirm: String,
}

/// Represents the payload for a user login request.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// New password submitted with a reset token.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(must_match = "password")]
    pub password_confirm: String,
}

/// Password change for the logged-in user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1))]
    pub password_current: String,
    #[validate(length(min = 8))]
    pub password: String,
    #[validate(must_match = "password")]
    pub password_confirm: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: PublicUser,
}

/// Response body after signup, login or a password change.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub status: String,
    /// The JWT for session authentication; also set as the `jwt` cookie.
    pub token: String,
    pub data: UserData,
}

impl AuthResponse {
    pub fn new(token: String, user: PublicUser) -> Self {
        Self {
            status: "success".to_string(),
            token,
            data: UserData { user },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn signup(password: &str, confirm: &str) -> SignupRequest {
        SignupRequest {
            name: "Alice Dev".to_string(),
            email: "alice@example.com".to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        let invalid_email_login = LoginRequest {
            email: "testexample.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(invalid_email_login.validate().is_err());

        let empty_password_login = LoginRequest {
            email: "test@example.com".to_string(),
            password: "".to_string(),
        };
        assert!(empty_password_login.validate().is_err());
    }

    #[test]
    fn test_signup_request_validation() {
        assert!(signup("password123", "password123").validate().is_ok());
        assert!(signup("short", "short").validate().is_err());
        assert!(signup("password123", "password124").validate().is_err());

        let mut bad_email = signup("password123", "password123");
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_signup_request_wire_names() {
        let request: SignupRequest = serde_json::from_value(serde_json::json!({
            "name": "Alice",
            "email": "alice@example.com",
            "password": "password123",
            "passwordConfirm": "password123"
        }))
        .unwrap();
        assert_eq!(request.password_confirm, "password123");
    }
}
