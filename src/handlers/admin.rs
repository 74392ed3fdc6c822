//! Admin CRUD handlers: changelist, change form, add, edit, delete.

use crate::config::{ResolvedEntity, LOOKUP_SEP};
use crate::error::AppError;
use crate::handlers::registered_entity;
use crate::response::{success_one, success_one_ok, success_page};
use crate::service::{CrudService, RequestValidator};
use crate::sql::{Filter, FilterOp, ListQuery, OrderBy};
use crate::state::AppState;
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{Map, Value};

/// Upper bound for `per_page`.
pub const MAX_PER_PAGE: u32 = 1000;

/// A parsed changelist request plus the page it addresses.
#[derive(Debug)]
pub struct Changelist {
    pub query: ListQuery,
    pub page: u32,
    pub per_page: u32,
}

fn parse_id(id_str: &str) -> Result<i64, AppError> {
    id_str
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid id '{}'", id_str)))
}

fn body_to_map(value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

fn parse_positive(key: &str, v: &str) -> Result<u32, AppError> {
    match v.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(AppError::BadRequest(format!("{} must be a positive integer", key))),
    }
}

fn parse_ordering(entity: &ResolvedEntity, raw: &str) -> Result<Vec<OrderBy>, AppError> {
    let mut out = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (field, descending) = match item.strip_prefix('-') {
            Some(f) => (f, true),
            None => (item, false),
        };
        let sortable = field == entity.pk_field || entity.admin.list_display.iter().any(|f| f == field);
        if !sortable {
            return Err(AppError::BadRequest(format!("cannot order by {}", field)));
        }
        out.push(OrderBy {
            field: field.to_string(),
            descending,
        });
    }
    Ok(out)
}

fn parse_filter(entity: &ResolvedEntity, key: &str, value: &str) -> Result<Filter, AppError> {
    let (field, op) = match key.rsplit_once(LOOKUP_SEP) {
        Some((f, "gte")) => (f, FilterOp::Gte),
        Some((f, "lte")) => (f, FilterOp::Lte),
        _ => (key, FilterOp::Eq),
    };
    let unknown = || AppError::BadRequest(format!("unknown query parameter {}", key));
    if !entity.admin.list_filter.iter().any(|f| f == field) {
        return Err(unknown());
    }
    let col = entity.column(field).ok_or_else(unknown)?;
    if op != FilterOp::Eq && !col.ty.is_temporal_range() {
        return Err(unknown());
    }
    Ok(Filter {
        field: field.to_string(),
        op,
        value: RequestValidator::coerce_query(col, value)?,
    })
}

/// Turn changelist query pairs into a `ListQuery`. Unknown keys and non-filterable fields are rejected.
pub fn parse_changelist(entity: &ResolvedEntity, params: &[(String, String)]) -> Result<Changelist, AppError> {
    let mut query = ListQuery::default();
    let mut page = 1u32;
    let mut per_page = entity.admin.list_per_page;
    for (k, v) in params {
        match k.as_str() {
            "q" => query.search_terms.extend(v.split_whitespace().map(str::to_string)),
            "o" => query.ordering = parse_ordering(entity, v)?,
            "page" => page = parse_positive(k, v)?,
            "per_page" => {
                per_page = parse_positive(k, v)?;
                if per_page > MAX_PER_PAGE {
                    return Err(AppError::BadRequest(format!("per_page must be at most {}", MAX_PER_PAGE)));
                }
            }
            _ => query.filters.push(parse_filter(entity, k, v)?),
        }
    }
    query.limit = per_page;
    query.offset = (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| AppError::BadRequest("page out of range".into()))?;
    Ok(Changelist { query, page, per_page })
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    params: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params?;
    let entity = registered_entity(&state.model, &path_segment)?;
    let changelist = parse_changelist(entity, &params)?;
    let (rows, total) = CrudService::changelist(&state.pool, &state.model, entity, &changelist.query).await?;
    Ok(success_page(rows, total, changelist.page, changelist.per_page))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let entity = registered_entity(&state.model, &path_segment)?;
    let Json(body) = body?;
    let body = body_to_map(body)?;
    let row = CrudService::create(&state.pool, &state.model, entity, &body).await?;
    Ok(success_one(row))
}

/// Change form: the row with its label; meta carries the form layout.
pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = registered_entity(&state.model, &path_segment)?;
    let id = parse_id(&id_str)?;
    let row = CrudService::read(&state.pool, &state.model, entity, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.verbose_name, id)))?;
    let meta = serde_json::json!({
        "fieldsets": entity.admin.fieldsets,
        "readonly_fields": entity.admin.readonly_fields,
    });
    Ok(success_one_ok(row, Some(meta)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let entity = registered_entity(&state.model, &path_segment)?;
    let id = parse_id(&id_str)?;
    let Json(body) = body?;
    let body = body_to_map(body)?;
    let row = CrudService::update(&state.pool, &state.model, entity, id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.verbose_name, id)))?;
    Ok(success_one_ok(row, None))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = registered_entity(&state.model, &path_segment)?;
    let id = parse_id(&id_str)?;
    if !CrudService::delete(&state.pool, entity, id).await? {
        return Err(AppError::NotFound(format!("{} {}", entity.verbose_name, id)));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::sql::PgBindValue;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_to_first_page_of_entity_size() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("reservations").unwrap();
        let c = parse_changelist(entity, &[]).unwrap();
        assert_eq!((c.page, c.per_page), (1, 100));
        assert_eq!((c.query.limit, c.query.offset), (100, 0));
        assert!(c.query.ordering.is_empty());
    }

    #[test]
    fn parses_search_filters_ordering_and_page() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("reservations").unwrap();
        let c = parse_changelist(
            entity,
            &pairs(&[
                ("q", " ana  lab "),
                ("status", "pending"),
                ("date__gte", "2024-01-01"),
                ("o", "-date,status"),
                ("page", "3"),
                ("per_page", "20"),
            ]),
        )
        .unwrap();
        assert_eq!(c.query.search_terms, vec!["ana", "lab"]);
        assert_eq!(c.query.filters.len(), 2);
        assert_eq!(c.query.filters[0].op, FilterOp::Eq);
        assert_eq!(c.query.filters[0].value, PgBindValue::text("pending"));
        assert_eq!(c.query.filters[1].field, "date");
        assert_eq!(c.query.filters[1].op, FilterOp::Gte);
        assert_eq!(
            c.query.ordering,
            vec![
                OrderBy {
                    field: "date".into(),
                    descending: true
                },
                OrderBy {
                    field: "status".into(),
                    descending: false
                },
            ]
        );
        assert_eq!((c.query.limit, c.query.offset), (20, 40));
    }

    #[test]
    fn boolean_filter_is_coerced() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("spaces").unwrap();
        let c = parse_changelist(entity, &pairs(&[("active", "true")])).unwrap();
        assert_eq!(c.query.filters[0].value, PgBindValue::Bool(true));
    }

    #[test]
    fn rejects_unknown_or_unfilterable_keys() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("reservations").unwrap();
        for (k, v) in [
            ("bogus", "1"),
            ("observations", "x"),
            ("status__gte", "a"),
            ("o", "observations"),
            ("page", "0"),
            ("per_page", "1001"),
        ] {
            let err = parse_changelist(entity, &pairs(&[(k, v)])).unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{}={}", k, v);
        }
    }

    #[test]
    fn malformed_filter_value_is_a_validation_error() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("reservations").unwrap();
        let err = parse_changelist(entity, &pairs(&[("date", "yesterday")])).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn ids_must_be_integers() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("abc"), Err(AppError::BadRequest(_))));
    }
}
