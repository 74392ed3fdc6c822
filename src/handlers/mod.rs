//! HTTP handlers for the admin registry and entity CRUD.

pub mod admin;
pub mod registry;

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;

/// Registered entity for a path segment, or 404.
pub(crate) fn registered_entity<'m>(model: &'m ResolvedModel, path_segment: &str) -> Result<&'m ResolvedEntity, AppError> {
    model
        .entities
        .iter()
        .find(|e| e.path_segment == path_segment)
        .ok_or_else(|| AppError::NotFound(format!("entity {}", path_segment)))
}
