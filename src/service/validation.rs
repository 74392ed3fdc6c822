//! Form cleaning from column declarations: the generic checks an admin form applies before saving.
//! Anything beyond storage shape (foreign-key existence, status values, time ranges) is left to the database.

use crate::config::{AutoTimestamp, ColumnInfo, ColumnType, ResolvedEntity};
use crate::error::AppError;
use crate::sql::PgBindValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Update,
}

pub struct RequestValidator;

impl RequestValidator {
    /// Clean a request body into bindable values. Unknown fields are rejected; primary key,
    /// read-only, and on-update fields are dropped. On create every required editable field must be present.
    pub fn clean<'e>(
        entity: &'e ResolvedEntity,
        body: &Map<String, Value>,
        mode: FormMode,
    ) -> Result<Vec<(&'e ColumnInfo, PgBindValue)>, AppError> {
        let mut out = Vec::new();
        for (key, value) in body {
            let col = entity
                .column(key)
                .ok_or_else(|| AppError::BadRequest(format!("unknown field {}", key)))?;
            if !entity.is_editable(col) || col.auto == Some(AutoTimestamp::OnUpdate) {
                tracing::warn!(entity = %entity.path_segment, field = %key, "ignoring read-only field");
                continue;
            }
            out.push((col, Self::coerce(col, value)?));
        }
        if mode == FormMode::Create {
            for col in &entity.columns {
                if col.required_on_create() && entity.is_editable(col) && !body.contains_key(&col.field) {
                    return Err(AppError::Validation(format!("{} is required", col.field)));
                }
            }
        }
        Ok(out)
    }

    /// Coerce a query-string value for filtering.
    pub fn coerce_query(col: &ColumnInfo, raw: &str) -> Result<PgBindValue, AppError> {
        Self::coerce(col, &Value::String(raw.to_string()))
    }

    pub fn coerce(col: &ColumnInfo, value: &Value) -> Result<PgBindValue, AppError> {
        let field = col.field.as_str();
        if value.is_null() {
            return if col.nullable {
                Ok(PgBindValue::Null)
            } else {
                Err(AppError::Validation(format!("{} may not be null", field)))
            };
        }
        match col.ty {
            ColumnType::BigInt | ColumnType::Integer => {
                let n = match value {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                }
                .ok_or_else(|| AppError::Validation(format!("{} must be a whole number", field)))?;
                if col.ty == ColumnType::Integer && i32::try_from(n).is_err() {
                    return Err(AppError::Validation(format!("{} is out of range", field)));
                }
                Ok(PgBindValue::I64(n))
            }
            ColumnType::Boolean => match value {
                Value::Bool(b) => Ok(PgBindValue::Bool(*b)),
                Value::String(s) if s.eq_ignore_ascii_case("true") || s == "1" => Ok(PgBindValue::Bool(true)),
                Value::String(s) if s.eq_ignore_ascii_case("false") || s == "0" => Ok(PgBindValue::Bool(false)),
                _ => Err(AppError::Validation(format!("{} must be true or false", field))),
            },
            ColumnType::VarChar { max_length } => {
                let s = as_str(field, value)?;
                if s.chars().count() > max_length as usize {
                    return Err(AppError::Validation(format!(
                        "{} must be at most {} characters",
                        field, max_length
                    )));
                }
                Ok(PgBindValue::text(s))
            }
            ColumnType::Text => Ok(PgBindValue::text(as_str(field, value)?)),
            ColumnType::Numeric { precision, scale } => {
                let raw = match value {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.trim().to_string(),
                    _ => return Err(AppError::Validation(format!("{} must be a number", field))),
                };
                check_decimal(field, &raw, precision, scale)?;
                Ok(PgBindValue::Text(raw))
            }
            ColumnType::Date => {
                let s = as_str(field, value)?;
                let d = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|_| AppError::Validation(format!("{} must be a date (YYYY-MM-DD)", field)))?;
                Ok(PgBindValue::Text(d.format("%Y-%m-%d").to_string()))
            }
            ColumnType::Time => {
                let s = as_str(field, value)?;
                let t = parse_time(s.trim())
                    .ok_or_else(|| AppError::Validation(format!("{} must be a time (HH:MM[:SS])", field)))?;
                Ok(PgBindValue::Text(t.format("%H:%M:%S%.f").to_string()))
            }
            ColumnType::Timestamp => {
                let s = as_str(field, value)?;
                let ts = parse_timestamp(s.trim())
                    .ok_or_else(|| AppError::Validation(format!("{} must be a date-time", field)))?;
                Ok(PgBindValue::Text(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
            }
        }
    }
}

fn as_str<'v>(field: &str, value: &'v Value) -> Result<&'v str, AppError> {
    value
        .as_str()
        .ok_or_else(|| AppError::Validation(format!("{} must be a string", field)))
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

/// RFC 3339 values are stored as their UTC wall time; naive values as given.
fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

/// Fixed-point check: at most `precision - scale` whole digits and `scale` fractional digits.
fn check_decimal(field: &str, raw: &str, precision: u8, scale: u8) -> Result<(), AppError> {
    let invalid = || AppError::Validation(format!("{} must be a decimal number", field));
    let unsigned = raw.strip_prefix('-').or_else(|| raw.strip_prefix('+')).unwrap_or(raw);
    let (whole, frac) = match unsigned.split_once('.') {
        Some((w, f)) => (w, f),
        None => (unsigned, ""),
    };
    if (whole.is_empty() && frac.is_empty())
        || !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    if frac.len() > scale as usize {
        return Err(AppError::Validation(format!(
            "{} must have at most {} decimal places",
            field, scale
        )));
    }
    let whole_digits = whole.trim_start_matches('0').len();
    let max_whole = precision.saturating_sub(scale) as usize;
    if whole_digits > max_whole {
        return Err(AppError::Validation(format!(
            "{} must have at most {} digits before the decimal point",
            field, max_whole
        )));
    }
    Ok(())
}
