//! Application wiring shared by `main` and the integration tests.

use actix_cors::Cors;
use actix_web::{error, http, web, HttpRequest};
use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::Config;
use crate::error::AppError;
use crate::mailer::Mailer;
use crate::routes;
use crate::store::Store;

/// Shared state handed to every handler through `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub mailer: Arc<dyn Mailer>,
    pub frontend_url: String,
    pub cookie_expires_in_days: i64,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn Store>, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            store,
            tokens: TokenService::new(&config.jwt_secret, config.jwt_expires_in),
            mailer,
            frontend_url: config.frontend_url.clone(),
            cookie_expires_in_days: config.jwt_cookie_expires_in_days,
            bcrypt_cost: config.bcrypt_cost,
        }
    }
}

/// Registers the extractor configs, `/health` and the `/api/v1` scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .app_data(query_config())
        .service(routes::health::health)
        .service(web::scope("/api/v1").configure(routes::config));
}

pub fn cors(config: &Config) -> Cors {
    config
        .cors_allowed_origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            http::header::AUTHORIZATION,
            http::header::ACCEPT,
            http::header::CONTENT_TYPE,
        ])
        .supports_credentials()
        .max_age(3600)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req: &HttpRequest| {
        AppError::BadRequest(format!("Invalid JSON body: {}", err)).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err: error::PathError, _req: &HttpRequest| {
        AppError::BadRequest(format!("Invalid path parameter: {}", err)).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err: error::QueryPayloadError, _req: &HttpRequest| {
        AppError::BadRequest(format!("Invalid query string: {}", err)).into()
    })
}
