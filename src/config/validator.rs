//! Catalog validation: identifiers, referential integrity, and admin option consistency.

use crate::config::{ColumnType, FullConfig, LabelPart};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("static identifier pattern"))
}

/// Identifiers reach SQL only through quoting, but the catalog is still held to plain lowercase names.
pub fn check_identifier(name: &str) -> Result<(), ConfigError> {
    if identifier_re().is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier(name.to_string()))
    }
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    check_identifier(&config.schema)?;

    let mut table_ids: HashSet<&str> = HashSet::new();
    for t in &config.tables {
        check_identifier(&t.id)?;
        check_identifier(&t.name)?;
        if !table_ids.insert(t.id.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(t.id.clone()));
        }
        if t.managed {
            return Err(ConfigError::Validation(format!(
                "table {} is marked managed; this catalog only maps externally owned tables",
                t.id
            )));
        }
        if t.label.is_empty() {
            return Err(ConfigError::Validation(format!("table {} has an empty label", t.id)));
        }
    }

    let mut fields_by_table: HashMap<&str, HashMap<&str, ColumnType>> = HashMap::new();
    for c in &config.columns {
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
        check_identifier(&c.field)?;
        check_identifier(&c.column)?;
        if c.field.contains("__") {
            return Err(ConfigError::InvalidIdentifier(c.field.clone()));
        }
        if let ColumnType::Numeric { precision, scale } = c.type_ {
            if precision == 0 || scale > precision {
                return Err(ConfigError::Validation(format!(
                    "{}.{}: numeric({}, {}) needs 1 <= precision and scale <= precision",
                    c.table_id, c.field, precision, scale
                )));
            }
        }
        let fields = fields_by_table.entry(c.table_id.as_str()).or_default();
        if fields.insert(c.field.as_str(), c.type_).is_some() {
            return Err(ConfigError::Validation(format!(
                "duplicate field {} on {}",
                c.field, c.table_id
            )));
        }
    }

    for t in &config.tables {
        let pk_ok = fields_by_table
            .get(t.id.as_str())
            .map(|f| f.contains_key(t.primary_key.as_str()))
            .unwrap_or(false);
        if !pk_ok {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: t.primary_key.clone(),
            });
        }
    }

    let mut relationship_fields: HashSet<(&str, &str)> = HashSet::new();
    for r in &config.relationships {
        if !table_ids.contains(r.to_table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: r.to_table_id.clone(),
            });
        }
        let ty = fields_by_table
            .get(r.from_table_id.as_str())
            .and_then(|f| f.get(r.from_field.as_str()))
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            })?;
        if !matches!(ty, ColumnType::BigInt | ColumnType::Integer) {
            return Err(ConfigError::Validation(format!(
                "relationship {} must use an integer column",
                r.id
            )));
        }
        if !relationship_fields.insert((r.from_table_id.as_str(), r.from_field.as_str())) {
            return Err(ConfigError::Validation(format!(
                "field {}.{} has more than one relationship",
                r.from_table_id, r.from_field
            )));
        }
    }

    let mut registered = HashSet::new();
    for admin in &config.admin {
        let fields = fields_by_table
            .get(admin.entity_id.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: admin.entity_id.clone(),
            })?;
        if !registered.insert(admin.entity_id.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(admin.entity_id.clone()));
        }
        let known = |kind: &'static str, names: &[String]| -> Result<(), ConfigError> {
            for name in names {
                if !fields.contains_key(name.as_str()) {
                    return Err(ConfigError::MissingReference {
                        kind,
                        id: format!("{}.{}", admin.entity_id, name),
                    });
                }
            }
            Ok(())
        };
        known("list_display field", &admin.list_display)?;
        known("list_filter field", &admin.list_filter)?;
        known("readonly field", &admin.readonly_fields)?;

        let mut seen = HashSet::new();
        for fs in &admin.fieldsets {
            known("fieldset field", &fs.fields)?;
            for f in &fs.fields {
                if !seen.insert(f.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "field {}.{} appears in more than one fieldset",
                        admin.entity_id, f
                    )));
                }
            }
        }
        if admin.list_per_page == Some(0) {
            return Err(ConfigError::Validation(format!(
                "list_per_page for {} must be positive",
                admin.entity_id
            )));
        }
    }

    Ok(())
}

/// Label and search lookups are checked on the resolved model, where relationships can be followed.
pub fn validate_lookups(model: &crate::config::ResolvedModel) -> Result<(), ConfigError> {
    for entity in &model.entities {
        for path in &entity.admin.search_fields {
            model.resolve_lookup(entity, path)?;
        }
        for part in entity.label.parts() {
            if let LabelPart::Field(path) = part {
                model.resolve_lookup(entity, path)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    #[test]
    fn catalog_is_valid() {
        validate(&catalog::catalog()).expect("catalog validates");
    }

    #[test]
    fn rejects_unknown_list_display_field() {
        let mut config = catalog::catalog();
        config.admin[0].list_display.push("colour".into());
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingReference { kind: "list_display field", .. }));
    }

    #[test]
    fn rejects_relationship_to_unknown_table() {
        let mut config = catalog::catalog();
        config.relationships[0].to_table_id = "rooms".into();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::MissingReference { kind: "table", .. })
        ));
    }

    #[test]
    fn rejects_managed_tables() {
        let mut config = catalog::catalog();
        config.tables[0].managed = true;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_quoted_identifiers() {
        assert!(check_identifier("reservas").is_ok());
        assert!(check_identifier("fecha_reserva").is_ok());
        assert!(check_identifier("Reservas").is_err());
        assert!(check_identifier("res\"ervas").is_err());
        assert!(check_identifier("").is_err());
    }

    #[test]
    fn rejects_numeric_scale_above_precision() {
        let mut config = catalog::catalog();
        price_column(&mut config).type_ = ColumnType::Numeric { precision: 2, scale: 4 };
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("numeric(2, 4)"), "{}", err);

        price_column(&mut config).type_ = ColumnType::Numeric { precision: 0, scale: 0 };
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        price_column(&mut config).type_ = ColumnType::Numeric { precision: 4, scale: 4 };
        assert!(validate(&config).is_ok());
    }

    fn price_column(config: &mut FullConfig) -> &mut crate::config::ColumnConfig {
        config.columns.iter_mut().find(|c| c.field == "hourly_price").unwrap()
    }

    #[test]
    fn rejects_field_in_two_fieldsets() {
        let mut config = catalog::catalog();
        let admin = config
            .admin
            .iter_mut()
            .find(|a| a.entity_id == "reservations")
            .unwrap();
        admin.fieldsets[1].fields.push("user".into());
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }
}
