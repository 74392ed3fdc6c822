//! Registry handlers: what the admin UI needs to render lists, filters, and forms.

use crate::config::{AdminOptions, AutoTimestamp, ColumnType, ResolvedEntity};
use crate::error::AppError;
use crate::handlers::registered_entity;
use crate::response::{success_many, success_one_ok};
use crate::service::CrudService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct EntitySummary {
    pub path: String,
    pub verbose_name: String,
    pub verbose_name_plural: String,
}

#[derive(Debug, Serialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ColumnType,
    pub nullable: bool,
    pub readonly: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EntityMeta {
    #[serde(flatten)]
    pub summary: EntitySummary,
    pub pk: String,
    pub fields: Vec<FieldMeta>,
    #[serde(flatten)]
    pub admin: AdminOptions,
}

fn summary(entity: &ResolvedEntity) -> EntitySummary {
    EntitySummary {
        path: entity.path_segment.clone(),
        verbose_name: entity.verbose_name.clone(),
        verbose_name_plural: entity.verbose_name_plural.clone(),
    }
}

pub fn entity_meta(entity: &ResolvedEntity) -> EntityMeta {
    EntityMeta {
        summary: summary(entity),
        pk: entity.pk_field.clone(),
        fields: entity
            .columns
            .iter()
            .map(|c| FieldMeta {
                name: c.field.clone(),
                ty: c.ty,
                nullable: c.nullable,
                readonly: !entity.is_editable(c) || c.auto == Some(AutoTimestamp::OnUpdate),
                related: c.relation.as_ref().map(|r| r.target.clone()),
            })
            .collect(),
        admin: entity.admin.clone(),
    }
}

pub async fn index(State(state): State<AppState>) -> impl IntoResponse {
    success_many(state.model.entities.iter().map(summary).collect())
}

pub async fn meta(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = registered_entity(&state.model, &path_segment)?;
    Ok(success_one_ok(entity_meta(entity), None))
}

pub async fn filters(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let entity = registered_entity(&state.model, &path_segment)?;
    let choices = CrudService::filter_choices(&state.pool, &state.model, entity).await?;
    Ok(success_many(choices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn meta_lists_fields_and_admin_options() {
        let model = catalog::resolved_catalog().unwrap();
        let entity = model.entity_by_path("spaces").unwrap();
        let v = serde_json::to_value(entity_meta(entity)).unwrap();
        assert_eq!(v["path"], "spaces");
        assert_eq!(v["verbose_name_plural"], "Spaces");
        assert_eq!(v["pk"], "id");
        assert_eq!(v["list_per_page"], 100);
        assert_eq!(v["readonly_fields"], serde_json::json!(["created_at", "updated_at"]));
        let space_type = v["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == "space_type")
            .unwrap();
        assert_eq!(space_type["related"], "space_types");
        assert_eq!(space_type["readonly"], false);
        let created = v["fields"].as_array().unwrap().iter().find(|f| f["name"] == "created_at").unwrap();
        assert_eq!(created["readonly"], true);
    }
}
