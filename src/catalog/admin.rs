//! Admin registrations: which fields are listed, filtered, searched, locked, and how edit forms are grouped.

use crate::config::{AdminConfig, FieldsetConfig};

fn names(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn fieldset(title: &str, fields: &[&str], collapsed: bool) -> FieldsetConfig {
    FieldsetConfig {
        title: Some(title.into()),
        fields: names(fields),
        collapsed,
    }
}

fn register(
    entity_id: &str,
    list_display: &[&str],
    list_filter: &[&str],
    search_fields: &[&str],
    readonly_fields: &[&str],
) -> AdminConfig {
    AdminConfig {
        entity_id: entity_id.into(),
        list_display: names(list_display),
        list_filter: names(list_filter),
        search_fields: names(search_fields),
        readonly_fields: names(readonly_fields),
        fieldsets: Vec::new(),
        list_per_page: None,
    }
}

pub fn registrations() -> Vec<AdminConfig> {
    let mut reservations = register(
        "reservations",
        &["user", "space", "date", "status", "total_price"],
        &["status", "date"],
        &["user__email", "space__name"],
        &["created_at", "updated_at"],
    );
    reservations.fieldsets = vec![
        fieldset("User and Space", &["user", "space"], false),
        fieldset("Dates and Times", &["date", "start_time", "end_time"], false),
        fieldset("Details", &["motive", "status", "total_price", "observations"], false),
        fieldset("Timestamps", &["created_at", "updated_at"], true),
    ];

    vec![
        register(
            "space_types",
            &["name", "active", "created_at"],
            &["active"],
            &["name"],
            &[],
        ),
        register(
            "spaces",
            &["name", "space_type", "capacity", "hourly_price", "active"],
            &["active", "space_type"],
            &["name", "location"],
            &["created_at", "updated_at"],
        ),
        register("reservation_reasons", &["name", "active"], &["active"], &["name"], &[]),
        register(
            "users",
            &["email", "first_name", "last_name", "role", "active"],
            &["role", "active"],
            &["email", "first_name", "student_id"],
            &["registered_at"],
        ),
        reservations,
    ]
}
