//! Reservation admin: a configuration-driven admin backend over an externally managed PostgreSQL schema.

pub mod catalog;
pub mod config;
pub mod error;
pub mod handlers;
pub mod label;
pub mod response;
pub mod routes;
pub mod schema_check;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;

pub use catalog::{catalog, catalog_in_schema, resolved_catalog};
pub use config::{resolve, FullConfig, ResolvedEntity, ResolvedModel};
pub use error::{AppError, ConfigError};
pub use response::{success_many, success_one, success_page};
pub use routes::{admin_routes, app, common_routes, registry_routes};
pub use schema_check::verify_schema;
pub use service::CrudService;
pub use settings::Settings;
pub use state::AppState;
