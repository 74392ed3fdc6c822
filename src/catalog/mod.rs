//! The reservation catalog: data-model declarations plus admin registrations.

pub mod admin;
pub mod models;

use crate::config::{resolve, FullConfig, ResolvedModel};
use crate::error::ConfigError;

pub const DEFAULT_SCHEMA: &str = "public";

/// Catalog bound to the default schema.
pub fn catalog() -> FullConfig {
    catalog_in_schema(DEFAULT_SCHEMA)
}

pub fn catalog_in_schema(schema: &str) -> FullConfig {
    FullConfig {
        schema: schema.to_string(),
        tables: models::tables(),
        columns: models::columns(),
        relationships: models::relationships(),
        admin: admin::registrations(),
    }
}

pub fn resolved_catalog() -> Result<ResolvedModel, ConfigError> {
    resolve(&catalog())
}
