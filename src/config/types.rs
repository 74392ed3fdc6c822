//! Declarative catalog types: table shapes, relationships, labels, and admin registrations.

use serde::{Deserialize, Serialize};

/// Storage type of a column as declared by the catalog. The catalog never creates columns;
/// the type drives parameter casts, form cleaning, and schema verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum ColumnType {
    BigInt,
    Integer,
    VarChar { max_length: u32 },
    Text,
    Boolean,
    Timestamp,
    Date,
    Time,
    Numeric { precision: u8, scale: u8 },
}

impl ColumnType {
    /// PostgreSQL type used in `$n::type` casts.
    pub fn pg_cast(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "bigint",
            ColumnType::Integer => "integer",
            ColumnType::VarChar { .. } => "varchar",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Date => "date",
            ColumnType::Time => "time",
            ColumnType::Numeric { .. } => "numeric",
        }
    }

    pub fn is_temporal_range(&self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::Timestamp)
    }
}

/// Timestamp columns maintained on write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoTimestamp {
    /// Set to NOW() on insert unless an editable value is supplied.
    OnCreate,
    /// Set to NOW() on insert and on every update.
    OnUpdate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPart {
    /// Field or `__` lookup path relative to the labelled entity.
    Field(String),
    Literal(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    /// Entity id; also the API path segment.
    pub id: String,
    /// Storage table name.
    pub name: String,
    pub primary_key: String,
    /// Always false for this catalog: schema lifecycle lives outside this crate.
    #[serde(default)]
    pub managed: bool,
    pub verbose_name: String,
    pub verbose_name_plural: String,
    pub label: Vec<LabelPart>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub table_id: String,
    /// API field name.
    pub field: String,
    /// Storage column name.
    pub column: String,
    #[serde(rename = "type")]
    pub type_: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub auto: Option<AutoTimestamp>,
}

/// Many-to-one: `from_table_id.from_field` references the primary key of `to_table_id`.
/// Deletes never cascade; referential integrity belongs to the database.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub id: String,
    pub from_table_id: String,
    pub from_field: String,
    pub to_table_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldsetConfig {
    #[serde(default)]
    pub title: Option<String>,
    pub fields: Vec<String>,
    #[serde(default)]
    pub collapsed: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    pub entity_id: String,
    #[serde(default)]
    pub list_display: Vec<String>,
    #[serde(default)]
    pub list_filter: Vec<String>,
    /// Field names or `__` lookups through relationships (e.g. `user__email`).
    #[serde(default)]
    pub search_fields: Vec<String>,
    #[serde(default)]
    pub readonly_fields: Vec<String>,
    #[serde(default)]
    pub fieldsets: Vec<FieldsetConfig>,
    #[serde(default)]
    pub list_per_page: Option<u32>,
}

/// Whole catalog in one struct for in-memory loading.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    pub schema: String,
    pub tables: Vec<TableConfig>,
    pub columns: Vec<ColumnConfig>,
    pub relationships: Vec<RelationshipConfig>,
    pub admin: Vec<AdminConfig>,
}
