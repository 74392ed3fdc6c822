//! Build the resolved model from the declarative catalog.

use crate::config::resolved::{AdminOptions, ColumnInfo, RelationInfo, ResolvedEntity, ResolvedModel};
use crate::config::types::*;
use crate::config::{validate, validate_lookups};
use crate::error::ConfigError;
use crate::label::LabelTemplate;
use std::collections::HashMap;

/// Default changelist page size.
pub const DEFAULT_LIST_PER_PAGE: u32 = 100;

/// Build resolved model from full config. Validates first; lookups are checked once relationships are resolved.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config
        .columns
        .iter()
        .fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let relation_by_field: HashMap<(&str, &str), &RelationshipConfig> = config
        .relationships
        .iter()
        .map(|r| ((r.from_table_id.as_str(), r.from_field.as_str()), r))
        .collect();
    let admin_by_table: HashMap<&str, &AdminConfig> = config
        .admin
        .iter()
        .map(|a| (a.entity_id.as_str(), a))
        .collect();

    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();

    for table in &config.tables {
        // Unregistered tables stay addressable as relationship targets but get no admin surface.
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        let columns: Vec<ColumnInfo> = table_columns
            .iter()
            .map(|c| ColumnInfo {
                field: c.field.clone(),
                column: c.column.clone(),
                ty: c.type_,
                nullable: c.nullable,
                auto: c.auto,
                is_pk: c.field == table.primary_key,
                relation: relation_by_field
                    .get(&(table.id.as_str(), c.field.as_str()))
                    .map(|r| RelationInfo {
                        target: r.to_table_id.clone(),
                    }),
            })
            .collect();

        let admin = match admin_by_table.get(table.id.as_str()) {
            Some(a) => AdminOptions {
                list_display: if a.list_display.is_empty() {
                    vec![table.primary_key.clone()]
                } else {
                    a.list_display.clone()
                },
                list_filter: a.list_filter.clone(),
                search_fields: a.search_fields.clone(),
                readonly_fields: a.readonly_fields.clone(),
                fieldsets: if a.fieldsets.is_empty() {
                    default_fieldsets(&columns)
                } else {
                    a.fieldsets.clone()
                },
                list_per_page: a.list_per_page.unwrap_or(DEFAULT_LIST_PER_PAGE),
            },
            None => AdminOptions {
                list_display: vec![table.primary_key.clone()],
                list_filter: Vec::new(),
                search_fields: Vec::new(),
                readonly_fields: Vec::new(),
                fieldsets: default_fieldsets(&columns),
                list_per_page: DEFAULT_LIST_PER_PAGE,
            },
        };

        let entity = ResolvedEntity {
            schema_name: config.schema.clone(),
            table_name: table.name.clone(),
            path_segment: table.id.clone(),
            verbose_name: table.verbose_name.clone(),
            verbose_name_plural: table.verbose_name_plural.clone(),
            pk_field: table.primary_key.clone(),
            columns,
            label: LabelTemplate::new(table.label.clone()),
            admin,
        };
        if admin_by_table.contains_key(table.id.as_str()) {
            entities.push(entity.clone());
        }
        entity_by_path.insert(table.id.clone(), entity);
    }

    let model = ResolvedModel {
        entities,
        entity_by_path,
    };
    validate_lookups(&model)?;
    Ok(model)
}

/// One untitled section with every non-PK field, in declaration order.
fn default_fieldsets(columns: &[ColumnInfo]) -> Vec<FieldsetConfig> {
    vec![FieldsetConfig {
        title: None,
        fields: columns.iter().filter(|c| !c.is_pk).map(|c| c.field.clone()).collect(),
        collapsed: false,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn resolves_all_registered_entities() {
        let model = resolve(&catalog::catalog()).unwrap();
        let paths: Vec<&str> = model.entities.iter().map(|e| e.path_segment.as_str()).collect();
        assert_eq!(
            paths,
            vec!["space_types", "spaces", "reservation_reasons", "users", "reservations"]
        );
    }

    #[test]
    fn relationships_point_at_targets() {
        let model = resolve(&catalog::catalog()).unwrap();
        let reservations = model.entity_by_path("reservations").unwrap();
        let user = reservations.column("user").unwrap();
        let rel = user.relation.as_ref().unwrap();
        assert_eq!(rel.target, "users");
        let space = model.entity_by_path("spaces").unwrap().column("space_type").unwrap();
        assert_eq!(space.relation.as_ref().unwrap().target, "space_types");
    }

    #[test]
    fn default_fieldset_covers_non_pk_fields() {
        let model = resolve(&catalog::catalog()).unwrap();
        let reasons = model.entity_by_path("reservation_reasons").unwrap();
        assert_eq!(reasons.admin.fieldsets.len(), 1);
        assert_eq!(reasons.admin.fieldsets[0].title, None);
        assert_eq!(
            reasons.admin.fieldsets[0].fields,
            vec!["name", "description", "active"]
        );
    }

    #[test]
    fn resolves_lookups_through_relationships() {
        let model = resolve(&catalog::catalog()).unwrap();
        let reservations = model.entity_by_path("reservations").unwrap();
        let lookup = model.resolve_lookup(reservations, "space__space_type__name").unwrap();
        assert_eq!(lookup.hops.len(), 2);
        assert_eq!(lookup.hops[1].1.table_name, "tipos_espacios");
        assert_eq!(lookup.column.column, "nombre");
    }

    #[test]
    fn rejects_lookup_through_plain_field() {
        let mut config = catalog::catalog();
        let admin = config.admin.iter_mut().find(|a| a.entity_id == "users").unwrap();
        admin.search_fields.push("email__domain".into());
        let err = resolve(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLookup { .. }));
    }
}
