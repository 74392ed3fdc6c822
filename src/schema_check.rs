//! Verify the connected database against the declared catalog. The tables are owned elsewhere:
//! nothing here issues DDL, a mismatch simply stops startup.

use crate::config::{ColumnType, ResolvedModel};
use crate::error::{AppError, ConfigError};
use sqlx::PgPool;
use std::collections::HashMap;

/// One row of `information_schema.columns`.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct StoredColumn {
    pub column_name: String,
    pub data_type: String,
    pub is_nullable: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaIssue {
    MissingTable { table: String },
    MissingColumn { table: String, column: String },
    TypeMismatch {
        table: String,
        column: String,
        expected: &'static str,
        found: String,
    },
    /// Declared NOT NULL but nullable in storage. Reported, not fatal.
    LooserNullability { table: String, column: String },
}

impl SchemaIssue {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SchemaIssue::LooserNullability { .. })
    }
}

impl std::fmt::Display for SchemaIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaIssue::MissingTable { table } => write!(f, "table {} is missing", table),
            SchemaIssue::MissingColumn { table, column } => write!(f, "column {}.{} is missing", table, column),
            SchemaIssue::TypeMismatch {
                table,
                column,
                expected,
                found,
            } => write!(f, "column {}.{} is {}, expected {}", table, column, found, expected),
            SchemaIssue::LooserNullability { table, column } => {
                write!(f, "column {}.{} is nullable in storage", table, column)
            }
        }
    }
}

/// `information_schema` data types a declared type accepts; the first is the canonical one.
fn accepted_types(ty: &ColumnType) -> &'static [&'static str] {
    match ty {
        ColumnType::BigInt => &["bigint", "integer"],
        ColumnType::Integer => &["integer", "smallint", "bigint"],
        ColumnType::VarChar { .. } => &["character varying", "text"],
        ColumnType::Text => &["text", "character varying"],
        ColumnType::Boolean => &["boolean"],
        ColumnType::Timestamp => &["timestamp without time zone", "timestamp with time zone"],
        ColumnType::Date => &["date"],
        ColumnType::Time => &["time without time zone"],
        ColumnType::Numeric { .. } => &["numeric"],
    }
}

/// Compare one declared entity with the columns found in storage (empty slice: table absent).
pub fn diff_table(entity: &crate::config::ResolvedEntity, stored: &[StoredColumn]) -> Vec<SchemaIssue> {
    let table = format!("{}.{}", entity.schema_name, entity.table_name);
    if stored.is_empty() {
        return vec![SchemaIssue::MissingTable { table }];
    }
    let by_name: HashMap<&str, &StoredColumn> = stored.iter().map(|c| (c.column_name.as_str(), c)).collect();
    let mut issues = Vec::new();
    for col in &entity.columns {
        let Some(found) = by_name.get(col.column.as_str()) else {
            issues.push(SchemaIssue::MissingColumn {
                table: table.clone(),
                column: col.column.clone(),
            });
            continue;
        };
        let accepted = accepted_types(&col.ty);
        if !accepted.contains(&found.data_type.as_str()) {
            issues.push(SchemaIssue::TypeMismatch {
                table: table.clone(),
                column: col.column.clone(),
                expected: accepted[0],
                found: found.data_type.clone(),
            });
        }
        if !col.nullable && !col.is_pk && found.is_nullable == "YES" {
            issues.push(SchemaIssue::LooserNullability {
                table: table.clone(),
                column: col.column.clone(),
            });
        }
    }
    issues
}

/// Check every declared table (registered or only referenced). Fails with every fatal issue listed.
pub async fn verify_schema(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    let mut entities: Vec<_> = model.entity_by_path.values().collect();
    entities.sort_by(|a, b| a.table_name.cmp(&b.table_name));

    let mut fatal = Vec::new();
    for entity in entities {
        let stored: Vec<StoredColumn> = sqlx::query_as(
            "SELECT column_name::text AS column_name, data_type::text AS data_type, is_nullable::text AS is_nullable \
             FROM information_schema.columns WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
        )
        .bind(&entity.schema_name)
        .bind(&entity.table_name)
        .fetch_all(pool)
        .await?;
        for issue in diff_table(entity, &stored) {
            if issue.is_fatal() {
                tracing::error!(%issue, "schema mismatch");
                fatal.push(issue.to_string());
            } else {
                tracing::warn!(%issue, "schema differs from declaration");
            }
        }
    }
    if !fatal.is_empty() {
        return Err(ConfigError::SchemaMismatch(fatal).into());
    }
    tracing::info!(tables = model.entity_by_path.len(), "schema verified");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn stored(name: &str, data_type: &str, nullable: bool) -> StoredColumn {
        StoredColumn {
            column_name: name.into(),
            data_type: data_type.into(),
            is_nullable: if nullable { "YES" } else { "NO" }.into(),
        }
    }

    fn space_types_columns() -> Vec<StoredColumn> {
        vec![
            stored("id", "bigint", false),
            stored("nombre", "character varying", false),
            stored("descripcion", "text", true),
            stored("icono", "character varying", true),
            stored("activo", "boolean", false),
            stored("fecha_creacion", "timestamp with time zone", false),
        ]
    }

    #[test]
    fn matching_table_has_no_issues() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("space_types").unwrap();
        assert!(diff_table(entity, &space_types_columns()).is_empty());
    }

    #[test]
    fn absent_table_is_reported_once() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("reservations").unwrap();
        assert_eq!(
            diff_table(entity, &[]),
            vec![SchemaIssue::MissingTable {
                table: "public.reservas".into()
            }]
        );
    }

    #[test]
    fn reports_missing_and_mistyped_columns() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("space_types").unwrap();
        let mut columns = space_types_columns();
        columns.retain(|c| c.column_name != "icono");
        columns[4] = stored("fecha_creacion", "date", false);
        let issues = diff_table(entity, &columns);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(SchemaIssue::is_fatal));
        assert_eq!(issues[0].to_string(), "column public.tipos_espacios.icono is missing");
        assert_eq!(
            issues[1].to_string(),
            "column public.tipos_espacios.fecha_creacion is date, expected timestamp without time zone"
        );
    }

    #[test]
    fn looser_nullability_is_not_fatal() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("space_types").unwrap();
        let mut columns = space_types_columns();
        columns[1] = stored("nombre", "character varying", true);
        let issues = diff_table(entity, &columns);
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].is_fatal());
    }
}
