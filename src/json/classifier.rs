//! Type/Value Classifier
//!
//! Decides the SQL affinity of a single value or field name. Name patterns
//! win when the observed value agrees with them; otherwise the value decides.

use crate::core::SqlType;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap();
    static ref ISO_DATETIME: Regex = Regex::new(
        r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(:\d{2}(\.\d+)?)?(Z|[+-]\d{2}:?\d{2})?$"
    )
    .unwrap();
}

const REAL_HINTS: &[&str] = &[
    "weight", "resolution", "temperature", "length", "score", "percentage",
];
const INTEGER_HINTS: &[&str] = &["count", "number", "index", "rank"];
const BOOLEAN_PREFIXES: &[&str] = &["is_", "has_", "can_"];
const TEXT_HINTS: &[&str] = &[
    "name", "title", "description", "sequence", "formula", "smiles", "inchi", "url", "email",
    "phone",
];

/// Type implied by the field name alone, if any rule applies.
pub fn classify_by_name(field_name: &str) -> Option<SqlType> {
    let name = field_name.to_ascii_lowercase();

    if name.ends_with("_id") {
        return Some(SqlType::Integer);
    }
    if name.ends_with("_date") {
        return Some(SqlType::Date);
    }
    if name.ends_with("_time") || name.ends_with("_at") {
        return Some(SqlType::DateTime);
    }
    // `ph` only as a whole token, otherwise "phone" or "graph" would match.
    if REAL_HINTS.iter().any(|h| name.contains(h)) || name.split('_').any(|t| t == "ph") {
        return Some(SqlType::Real);
    }
    if INTEGER_HINTS.iter().any(|h| name.contains(h)) {
        return Some(SqlType::Integer);
    }
    if BOOLEAN_PREFIXES.iter().any(|p| name.starts_with(p)) {
        return Some(SqlType::Integer);
    }
    if TEXT_HINTS.iter().any(|h| name.contains(h)) {
        return Some(SqlType::Text);
    }
    None
}

/// Type implied by the value alone.
pub fn classify(value: &JsonValue) -> SqlType {
    match value {
        JsonValue::Bool(_) => SqlType::Integer,
        JsonValue::Number(n) => {
            if is_integral(n) {
                SqlType::Integer
            } else {
                SqlType::Real
            }
        }
        JsonValue::String(s) if is_iso_date(s) || is_iso_datetime(s) => SqlType::Date,
        JsonValue::String(_) => SqlType::Text,
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => SqlType::Text,
    }
}

/// Type vote for one observed field value. `None` means the observation
/// carries no type information (a null with no name rule).
pub fn classify_field(field_name: &str, value: &JsonValue) -> Option<SqlType> {
    match classify_by_name(field_name) {
        Some(named) if value.is_null() || agrees_with(named, value) => Some(named),
        _ if value.is_null() => None,
        _ => Some(classify(value)),
    }
}

/// Resolves several observations of one column by fixed priority.
pub fn union_types<I>(types: I) -> SqlType
where
    I: IntoIterator<Item = SqlType>,
{
    types
        .into_iter()
        .max_by_key(|t| t.priority())
        .unwrap_or(SqlType::Text)
}

fn agrees_with(named: SqlType, value: &JsonValue) -> bool {
    match (named, value) {
        (SqlType::Text, _) => true,
        (SqlType::Integer, JsonValue::Bool(_)) => true,
        (SqlType::Integer, JsonValue::Number(n)) => is_integral(n),
        (SqlType::Integer, JsonValue::String(s)) => s.trim().parse::<i64>().is_ok(),
        (SqlType::Real, JsonValue::Number(_)) => true,
        (SqlType::Real, JsonValue::String(s)) => s.trim().parse::<f64>().is_ok(),
        (SqlType::Date | SqlType::DateTime, JsonValue::String(s)) => {
            is_iso_date(s) || is_iso_datetime(s)
        }
        _ => false,
    }
}

fn is_integral(n: &serde_json::Number) -> bool {
    if n.is_i64() || n.is_u64() {
        return true;
    }
    n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

pub fn is_iso_date(s: &str) -> bool {
    ISO_DATE.is_match(s) && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

pub fn is_iso_datetime(s: &str) -> bool {
    if !ISO_DATETIME.is_match(s) {
        return false;
    }
    DateTime::parse_from_rfc3339(s).is_ok()
        || ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
}
