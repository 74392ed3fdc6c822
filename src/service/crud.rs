//! Generic CRUD execution against PostgreSQL.

use crate::config::{ColumnType, ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::label::strip_hidden_columns;
use crate::service::validation::{FormMode, RequestValidator};
use crate::sql::{
    delete, insert, select_by_id, select_changelist, select_distinct_values, select_relation_choices, update,
    ListQuery, QueryBuf,
};
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{PgConnection, PgPool, Postgres};

/// Selectable values for one list filter.
#[derive(Debug, Serialize)]
pub struct FilterChoices {
    pub field: String,
    pub choices: Vec<Choice>,
}

#[derive(Debug, Serialize)]
pub struct Choice {
    pub value: Value,
    pub label: String,
}

pub struct CrudService;

impl CrudService {
    /// One changelist page and the total number of matching rows.
    pub async fn changelist(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        query: &ListQuery,
    ) -> Result<(Vec<Value>, u64), AppError> {
        let (page, count) = select_changelist(model, entity, query)?;
        let rows = Self::query_many(pool, &page).await?;
        tracing::debug!(sql = %count.sql, params = ?count.params, "query");
        let total: i64 = bind_all(&count).fetch_one(pool).await.and_then(|r| {
            use sqlx::Row;
            r.try_get("total")
        })?;
        let rows = rows
            .into_iter()
            .map(|row| present_list_row(model, entity, row))
            .collect();
        Ok((rows, total.max(0) as u64))
    }

    /// Fetch one row by primary key with its label. Returns None when absent.
    pub async fn read(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: i64,
    ) -> Result<Option<Value>, AppError> {
        let q = select_by_id(model, entity, id)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q).fetch_optional(pool).await?;
        Ok(row.map(|r| present_detail_row(entity, row_to_json(&r))))
    }

    /// Clean and insert one row; returns the stored row as re-read inside the same transaction.
    pub async fn create(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let values = RequestValidator::clean(entity, body, FormMode::Create)?;
        let mut tx = pool.begin().await?;
        let q = insert(entity, &values);
        let id = Self::returning_pk(&mut tx, &q)
            .await?
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))?;
        let row = Self::read_in(&mut tx, model, entity, id)
            .await?
            .ok_or_else(|| AppError::Db(sqlx::Error::RowNotFound))?;
        tx.commit().await?;
        tracing::info!(entity = %entity.path_segment, id, "created");
        Ok(row)
    }

    /// Clean and apply a partial update. Returns None when the row does not exist.
    pub async fn update(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let values = RequestValidator::clean(entity, body, FormMode::Update)?;
        let mut tx = pool.begin().await?;
        let q = update(entity, id, &values);
        if Self::returning_pk(&mut tx, &q).await?.is_none() {
            return Ok(None);
        }
        let row = Self::read_in(&mut tx, model, entity, id).await?;
        tx.commit().await?;
        tracing::info!(entity = %entity.path_segment, id, "updated");
        Ok(row)
    }

    /// Delete one row by id. Returns false when nothing was deleted.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<bool, AppError> {
        let q = delete(entity, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(&q).fetch_optional(pool).await?;
        if row.is_some() {
            tracing::info!(entity = %entity.path_segment, id, "deleted");
        }
        Ok(row.is_some())
    }

    /// Choices for every list filter: booleans, related rows by label, or distinct stored values.
    pub async fn filter_choices(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
    ) -> Result<Vec<FilterChoices>, AppError> {
        let mut out = Vec::with_capacity(entity.admin.list_filter.len());
        for field in &entity.admin.list_filter {
            let col = entity
                .column(field)
                .ok_or_else(|| AppError::NotFound(field.clone()))?;
            let choices = if let Some(rel) = &col.relation {
                let target = model
                    .entity_by_path(&rel.target)
                    .ok_or_else(|| AppError::NotFound(rel.target.clone()))?;
                let q = select_relation_choices(model, target)?;
                Self::query_many(pool, &q)
                    .await?
                    .into_iter()
                    .filter_map(|row| match row {
                        Value::Object(map) => Some(Choice {
                            label: target.label.render_from_row(&map, ""),
                            value: map.get(&target.pk_field).cloned().unwrap_or(Value::Null),
                        }),
                        _ => None,
                    })
                    .collect()
            } else if col.ty == ColumnType::Boolean {
                vec![
                    Choice {
                        value: Value::Bool(true),
                        label: "Yes".into(),
                    },
                    Choice {
                        value: Value::Bool(false),
                        label: "No".into(),
                    },
                ]
            } else {
                let q = select_distinct_values(entity, col);
                Self::query_many(pool, &q)
                    .await?
                    .into_iter()
                    .filter_map(|row| row.get("value").cloned())
                    .map(|value| Choice {
                        label: match &value {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        },
                        value,
                    })
                    .collect()
            };
            out.push(FilterChoices {
                field: field.clone(),
                choices,
            });
        }
        Ok(out)
    }

    async fn read_in(
        conn: &mut PgConnection,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: i64,
    ) -> Result<Option<Value>, AppError> {
        let q = select_by_id(model, entity, id)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let row = bind_all(&q).fetch_optional(&mut *conn).await?;
        Ok(row.map(|r| present_detail_row(entity, row_to_json(&r))))
    }

    async fn returning_pk(conn: &mut PgConnection, q: &QueryBuf) -> Result<Option<i64>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query (tx)");
        let row = bind_all(q).fetch_optional(&mut *conn).await?;
        Ok(row.and_then(|r| row_to_json(&r).as_object().and_then(first_i64)))
    }

    async fn query_many(pool: &PgPool, q: &QueryBuf) -> Result<Vec<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(q).fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

fn bind_all(q: &QueryBuf) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

fn first_i64(map: &Map<String, Value>) -> Option<i64> {
    map.values().next().and_then(Value::as_i64)
}

/// Changelist row: own label, relationship columns as `{ id, label }`, hidden label inputs removed.
fn present_list_row(model: &ResolvedModel, entity: &ResolvedEntity, row: Value) -> Value {
    let mut map = match row {
        Value::Object(map) => map,
        other => return other,
    };
    let label = entity.label.render_from_row(&map, "");
    for field in &entity.admin.list_display {
        let Some(col) = entity.column(field) else { continue };
        let Some(target) = col.relation.as_ref().and_then(|r| model.entity_by_path(&r.target)) else {
            continue;
        };
        let id = map.get(field).cloned().unwrap_or(Value::Null);
        let related_label = if id.is_null() {
            Value::Null
        } else {
            Value::String(target.label.render_from_row(&map, &format!("{}__", field)))
        };
        map.insert(field.clone(), serde_json::json!({ "id": id, "label": related_label }));
    }
    strip_hidden_columns(&mut map);
    map.insert("label".into(), Value::String(label));
    Value::Object(map)
}

fn present_detail_row(entity: &ResolvedEntity, row: Value) -> Value {
    let mut map = match row {
        Value::Object(map) => map,
        other => return other,
    };
    let label = entity.label.render_from_row(&map, "");
    strip_hidden_columns(&mut map);
    map.insert("label".into(), Value::String(label));
    Value::Object(map)
}

fn row_to_json(row: &PgRow) -> Value {
    use sqlx::Column;
    use sqlx::Row;
    let mut map = Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

/// Whole seconds render as `HH:MM:SS`; sub-second precision is kept when stored.
fn format_time(t: chrono::NaiveTime) -> String {
    t.format("%H:%M:%S%.f").to_string()
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(t)) = row.try_get::<Option<chrono::NaiveTime>, _>(name) {
        return Value::String(format_time(t));
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use serde_json::json;

    #[test]
    fn times_keep_fractional_seconds() {
        let whole = chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(format_time(whole), "09:00:00");
        let half = chrono::NaiveTime::from_hms_milli_opt(9, 0, 0, 500).unwrap();
        assert_eq!(format_time(half), "09:00:00.500");
    }

    #[test]
    fn list_row_renders_relationship_labels() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("reservations").unwrap();
        let row = json!({
            "id": 10,
            "user": 3,
            "space": 4,
            "date": "2024-01-01",
            "status": "pending",
            "total_price": "20.00",
            "__label__user__email": "a@b.com",
            "__label__user__role": "student",
            "__label__space__name": "Room 1",
            "__label__date": "2024-01-01",
        });
        let out = present_list_row(&model, entity, row);
        assert_eq!(out["label"], "a@b.com - Room 1 (2024-01-01)");
        assert_eq!(out["user"], json!({ "id": 3, "label": "a@b.com (student)" }));
        assert_eq!(out["space"], json!({ "id": 4, "label": "Room 1" }));
        assert!(out.as_object().unwrap().keys().all(|k| !k.starts_with("__label__")));
    }

    #[test]
    fn detail_row_gets_label() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("users").unwrap();
        let row = json!({
            "id": 1,
            "email": "x@y.com",
            "role": "admin",
            "__label__email": "x@y.com",
            "__label__role": "admin",
        });
        let out = present_detail_row(entity, row);
        assert_eq!(out["label"], "x@y.com (admin)");
        assert_eq!(out.as_object().unwrap().len(), 4);
    }

    #[test]
    fn returning_pk_reads_first_column() {
        let row = json!({ "id": 42 });
        assert_eq!(first_i64(row.as_object().unwrap()), Some(42));
    }
}
