//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! Handlers, middleware and the membership registry all return it, and it renders
//! itself as a JSON body of the form `{"status": "fail" | "error", "message": ...}`.
//!
//! Client errors (4xx) are operational: their message is shown verbatim. Server
//! errors (5xx) are logged and reduced to a generic message unless detailed errors
//! were switched on at start-up with [`expose_internal_errors`].

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use validator::ValidationErrors;

use crate::store::StoreError;

/// Message shown to clients for unexpected errors when detailed errors are off.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

static DETAILED_ERRORS: AtomicBool = AtomicBool::new(false);

/// Turns detailed 5xx bodies on or off. Called once from `main` based on `APP_ENV`.
pub fn expose_internal_errors(enabled: bool) {
    DETAILED_ERRORS.store(enabled, Ordering::Relaxed);
}

/// Represents all possible errors that can occur within the application.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed or missing request data (HTTP 400).
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Input rejected by a `validator` rule (HTTP 400).
    #[error("Validation Error: {0}")]
    ValidationError(String),
    /// Missing, invalid or expired credentials (HTTP 401).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// Authenticated, but the caller's role does not allow the action (HTTP 403).
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The requested resource does not exist (HTTP 404).
    #[error("Not Found: {0}")]
    NotFound(String),
    /// The write would duplicate an existing record (HTTP 409).
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Represents an unexpected server-side error (HTTP 500).
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
    /// A persistence failure that is not one of the translated cases (HTTP 500).
    #[error("Database Error: {0}")]
    DatabaseError(String),
}

impl AppError {
    /// Known errors carry a message meant for the client.
    pub fn is_operational(&self) -> bool {
        !matches!(
            self,
            AppError::InternalServerError(_) | AppError::DatabaseError(_)
        )
    }

    fn message(&self) -> &str {
        match self {
            AppError::BadRequest(msg)
            | AppError::ValidationError(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::InternalServerError(msg)
            | AppError::DatabaseError(msg) => msg,
        }
    }

    /// Builds the JSON body. `detailed` controls whether server errors leak their text.
    pub fn body(&self, detailed: bool) -> serde_json::Value {
        if self.is_operational() {
            return json!({
                "status": "fail",
                "message": self.message(),
            });
        }

        if detailed {
            json!({
                "status": "error",
                "message": self.message(),
                "error": self.to_string(),
            })
        } else {
            json!({
                "status": "error",
                "message": GENERIC_ERROR_MESSAGE,
            })
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        if !self.is_operational() {
            log::error!("{}", self);
        }
        HttpResponse::build(self.status_code()).json(self.body(DETAILED_ERRORS.load(Ordering::Relaxed)))
    }
}

/// Persistence errors are translated here so handlers never see adapter details.
impl From<StoreError> for AppError {
    fn from(error: StoreError) -> AppError {
        match error {
            StoreError::NotFound => AppError::NotFound("Record not found".into()),
            StoreError::Duplicate(field) => {
                AppError::Conflict(format!("Duplicate field value: {}", field))
            }
            StoreError::MissingReference(what) => {
                AppError::BadRequest(format!("Referenced {} does not exist", what))
            }
            StoreError::Database(msg) => AppError::DatabaseError(msg),
        }
    }
}

/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::ValidationError(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        match error.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                AppError::Unauthorized("Your token has expired. Please log in again!".into())
            }
            _ => AppError::Unauthorized("Invalid token. Please log in again!".into()),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
