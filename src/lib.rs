#![doc = "The `taskhive` library crate."]
#![doc = ""]
#![doc = "Domain models, the persistence port and its adapters, authentication and"]
#![doc = "project-access middleware, the membership registry, routing and error"]
#![doc = "handling. The binary (`main.rs`) reads the configuration, opens the store"]
#![doc = "and serves the routes configured by [`app::configure`]; `bin/seed.rs` loads"]
#![doc = "demo data through the same store."]

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod mailer;
pub mod models;
pub mod registry;
pub mod routes;
pub mod seed;
pub mod store;

pub use crate::app::AppState;
pub use crate::error::AppError;
