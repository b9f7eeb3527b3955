//! Field rules for entity input

use std::collections::BTreeMap;

use catalog_common::db::SqlValue;
use serde_json::{Map, Value};
use url::Url;

/// Messages per field name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// String with at least this many characters after trimming
    Text { min_len: usize },
    /// Number (or numeric string) >= 0
    Price,
    /// Absolute http(s) URL with a host
    Url,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub rule: FieldRule,
}

/// Check `input` against `fields` and convert the supplied values to
/// column values.
///
/// With `require_all`, every field must be present and non-empty.
/// Otherwise only the supplied fields are checked.
pub fn validate(
    fields: &[FieldSpec],
    input: &Map<String, Value>,
    require_all: bool,
) -> Result<Vec<(&'static str, SqlValue)>, FieldErrors> {
    let mut errors = FieldErrors::new();
    let mut values = Vec::new();

    for spec in fields {
        let supplied = input.get(spec.name).filter(|v| !v.is_null());

        let Some(raw) = supplied else {
            if require_all {
                add(&mut errors, spec.name, format!("{} is required", spec.label));
            }
            continue;
        };

        match check(spec, raw) {
            Ok(value) => values.push((spec.name, value)),
            Err(message) => add(&mut errors, spec.name, message),
        }
    }

    if errors.is_empty() {
        Ok(values)
    } else {
        Err(errors)
    }
}

fn check(spec: &FieldSpec, raw: &Value) -> Result<SqlValue, String> {
    match spec.rule {
        FieldRule::Text { min_len } => {
            let text = raw
                .as_str()
                .ok_or_else(|| format!("{} must be a string", spec.label))?;
            if text.trim().chars().count() < min_len {
                return Err(format!(
                    "{} must be at least {} characters",
                    spec.label, min_len
                ));
            }
            Ok(SqlValue::from(text))
        }
        FieldRule::Price => {
            let price = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match price {
                Some(p) if p.is_finite() && p >= 0.0 => Ok(SqlValue::Real(p)),
                _ => Err(format!("{} must be a non-negative number", spec.label)),
            }
        }
        FieldRule::Url => {
            let text = raw.as_str().unwrap_or_default();
            let valid = Url::parse(text)
                .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
                .unwrap_or(false);
            if valid {
                Ok(SqlValue::from(text))
            } else {
                Err(format!("{} must be a valid http(s) URL", spec.label))
            }
        }
    }
}

/// Category names from a JSON array of strings or a comma-separated string.
///
/// `None` when the field is absent or null.
pub fn parse_categories(raw: Option<&Value>) -> Result<Option<Vec<String>>, FieldErrors> {
    let invalid = || {
        let mut errors = FieldErrors::new();
        add(
            &mut errors,
            "categories",
            "Categories must be a list of names or a comma-separated string".to_string(),
        );
        errors
    };

    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.split(',').map(str::to_string).collect())),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(invalid()),
    }
}

fn add(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}
