//! Human-readable entity labels: the single-value rendering used in lists, relationship columns, and filter choices.

use crate::config::LabelPart;
use serde_json::Value;

/// Prefix of the hidden columns a query selects to feed label rendering.
pub const LABEL_COLUMN_PREFIX: &str = "__label__";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelTemplate {
    parts: Vec<LabelPart>,
}

impl LabelTemplate {
    pub fn new(parts: Vec<LabelPart>) -> Self {
        LabelTemplate { parts }
    }

    pub fn parts(&self) -> &[LabelPart] {
        &self.parts
    }

    /// Field paths the template reads, in order of first use.
    pub fn paths(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for part in &self.parts {
            if let LabelPart::Field(path) = part {
                if !out.contains(&path.as_str()) {
                    out.push(path.as_str());
                }
            }
        }
        out
    }

    /// Render with `value_of` supplying each field path. Missing values and nulls render empty.
    pub fn render<F>(&self, mut value_of: F) -> String
    where
        F: FnMut(&str) -> Option<Value>,
    {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                LabelPart::Literal(s) => out.push_str(s),
                LabelPart::Field(path) => {
                    if let Some(v) = value_of(path) {
                        push_display(&mut out, &v);
                    }
                }
            }
        }
        out
    }

    /// Render from a row carrying hidden label columns for `prefix` (empty for the row's own entity).
    pub fn render_from_row(&self, row: &serde_json::Map<String, Value>, prefix: &str) -> String {
        self.render(|path| row.get(&hidden_column(prefix, path)).cloned())
    }
}

/// Hidden column alias for a label input: `__label__` + prefix + path.
pub fn hidden_column(prefix: &str, path: &str) -> String {
    format!("{}{}{}", LABEL_COLUMN_PREFIX, prefix, path)
}

fn push_display(out: &mut String, v: &Value) {
    match v {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        other => out.push_str(&other.to_string()),
    }
}

/// Drop hidden label inputs once labels are rendered.
pub fn strip_hidden_columns(row: &mut serde_json::Map<String, Value>) {
    row.retain(|k, _| !k.starts_with(LABEL_COLUMN_PREFIX));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use serde_json::json;

    fn label_of(entity: &str) -> LabelTemplate {
        let model = catalog::resolved_catalog().expect("catalog resolves");
        model.entity_by_path(entity).expect("registered").label.clone()
    }

    #[test]
    fn reservation_label_joins_user_space_and_date() {
        let label = label_of("reservations");
        let rendered = label.render(|path| match path {
            "user__email" => Some(json!("a@b.com")),
            "space__name" => Some(json!("Room 1")),
            "date" => Some(json!("2024-01-01")),
            _ => None,
        });
        assert_eq!(rendered, "a@b.com - Room 1 (2024-01-01)");
    }

    #[test]
    fn user_label_is_email_then_role() {
        let label = label_of("users");
        let rendered = label.render(|path| match path {
            "email" => Some(json!("x@y.com")),
            "role" => Some(json!("admin")),
            _ => None,
        });
        assert_eq!(rendered, "x@y.com (admin)");
    }

    #[test]
    fn named_entities_render_their_name() {
        for entity in ["space_types", "spaces", "reservation_reasons"] {
            let label = label_of(entity);
            assert_eq!(label.paths(), vec!["name"]);
            assert_eq!(label.render(|_| Some(json!("Auditorio"))), "Auditorio");
        }
    }

    #[test]
    fn renders_from_hidden_row_columns() {
        let label = label_of("users");
        let row = json!({
            "id": 3,
            "__label__user__email": "x@y.com",
            "__label__user__role": "student",
        });
        let row = row.as_object().unwrap();
        assert_eq!(label.render_from_row(row, "user__"), "x@y.com (student)");
    }

    #[test]
    fn null_parts_render_empty() {
        let label = LabelTemplate::new(vec![
            LabelPart::Field("name".into()),
            LabelPart::Literal(" #".into()),
            LabelPart::Field("capacity".into()),
        ]);
        assert_eq!(label.render(|p| if p == "capacity" { Some(json!(12)) } else { Some(Value::Null) }), " #12");
    }

    #[test]
    fn strip_removes_only_hidden_columns() {
        let mut row = json!({ "id": 1, "name": "A", "__label__name": "A" });
        let row = row.as_object_mut().unwrap();
        strip_hidden_columns(row);
        assert_eq!(row.len(), 2);
        assert!(row.contains_key("name"));
    }
}
