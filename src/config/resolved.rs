//! Resolved entity model: catalog validated and flattened for runtime use.

use crate::config::{AutoTimestamp, ColumnType, FieldsetConfig};
use crate::error::ConfigError;
use crate::label::LabelTemplate;
use serde::Serialize;
use std::collections::HashMap;

/// Separator for lookups through relationships, e.g. `user__email`.
pub const LOOKUP_SEP: &str = "__";

/// Target of a many-to-one column.
#[derive(Clone, Debug)]
pub struct RelationInfo {
    /// Path segment of the referenced entity.
    pub target: String,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub field: String,
    pub column: String,
    pub ty: ColumnType,
    pub nullable: bool,
    pub auto: Option<AutoTimestamp>,
    pub is_pk: bool,
    pub relation: Option<RelationInfo>,
}

impl ColumnInfo {
    /// Must be supplied on create: not nullable, not maintained automatically, not the primary key.
    pub fn required_on_create(&self) -> bool {
        !self.nullable && self.auto.is_none() && !self.is_pk
    }
}

/// Admin options for one entity, in the shape served to the admin UI.
#[derive(Clone, Debug, Serialize)]
pub struct AdminOptions {
    pub list_display: Vec<String>,
    pub list_filter: Vec<String>,
    pub search_fields: Vec<String>,
    pub readonly_fields: Vec<String>,
    pub fieldsets: Vec<FieldsetConfig>,
    pub list_per_page: u32,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub pk_field: String,
    pub columns: Vec<ColumnInfo>,
    pub label: LabelTemplate,
    pub admin: AdminOptions,
}

impl ResolvedEntity {
    pub fn column(&self, field: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn pk(&self) -> &ColumnInfo {
        self.columns
            .iter()
            .find(|c| c.is_pk)
            .unwrap_or(&self.columns[0])
    }

    pub fn is_readonly(&self, field: &str) -> bool {
        self.admin.readonly_fields.iter().any(|f| f == field)
    }

    /// Editable on the change form: not the primary key and not read-only.
    pub fn is_editable(&self, col: &ColumnInfo) -> bool {
        !col.is_pk && !self.is_readonly(&col.field)
    }
}

/// One resolved `__` lookup: the relationship hops taken and the final column.
#[derive(Debug)]
pub struct Lookup<'m> {
    /// (relationship column on the source entity, entity it points to), in order.
    pub hops: Vec<(&'m ColumnInfo, &'m ResolvedEntity)>,
    pub column: &'m ColumnInfo,
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }

    /// Resolve `path` relative to `entity`. Every segment but the last must be a relationship.
    pub fn resolve_lookup<'m>(&'m self, entity: &'m ResolvedEntity, path: &str) -> Result<Lookup<'m>, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidLookup {
            entity: entity.path_segment.clone(),
            path: path.to_string(),
            reason,
        };
        let segments: Vec<&str> = path.split(LOOKUP_SEP).collect();
        let mut current = entity;
        let mut hops = Vec::new();
        for (i, seg) in segments.iter().enumerate() {
            let col = current
                .column(seg)
                .ok_or_else(|| invalid(format!("{} has no field '{}'", current.path_segment, seg)))?;
            if i + 1 == segments.len() {
                return Ok(Lookup { hops, column: col });
            }
            let rel = col
                .relation
                .as_ref()
                .ok_or_else(|| invalid(format!("'{}' is not a relationship", seg)))?;
            let target = self
                .entity_by_path(&rel.target)
                .ok_or_else(|| invalid(format!("unknown entity '{}'", rel.target)))?;
            hops.push((col, target));
            current = target;
        }
        Err(invalid("empty lookup".into()))
    }
}
