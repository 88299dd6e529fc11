//! Field flattening
//!
//! Turns one object into `(column, value)` pairs. Nested entities and lists
//! of entities are relationships and are skipped here; nested plain objects
//! are hoisted as `outer_inner` columns or stored whole as `outer_json`.

use super::entity::{is_entity, is_entity_list, is_scalar, list_items, JsonObject};
use crate::config::StagingConfig;
use crate::naming::sanitize_column_name;
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy)]
pub struct FlattenRules {
    pub max_inline_array_len: usize,
    pub max_depth: usize,
    pub max_fields: usize,
}

impl FlattenRules {
    pub fn from_config(config: &StagingConfig) -> Self {
        Self {
            max_inline_array_len: config.max_inline_array_len,
            max_depth: config.max_flatten_depth,
            max_fields: config.max_flatten_fields,
        }
    }
}

impl Default for FlattenRules {
    fn default() -> Self {
        Self::from_config(&StagingConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Scalar(&'a JsonValue),
    /// Serialized array or object, stored as TEXT.
    Json(String),
}

impl FieldValue<'_> {
    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::Scalar(v) => (*v).clone(),
            FieldValue::Json(text) => JsonValue::String(text.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatField<'a> {
    pub column: String,
    pub value: FieldValue<'a>,
}

/// Flattens an entity object. Its own `id`/`_id` become the primary key and
/// are not emitted as columns.
pub fn flatten_entity<'a>(obj: &'a JsonObject, rules: &FlattenRules) -> Vec<FlatField<'a>> {
    let mut out = Vec::new();
    flatten_into(obj, "", 0, rules, &mut out);
    out.retain(|f| f.column != "id");
    out
}

/// Flattens a root value for the no-entity fallback table.
pub fn flatten_document_row<'a>(value: &'a JsonValue, rules: &FlattenRules) -> Vec<FlatField<'a>> {
    match value {
        JsonValue::Object(obj) => {
            let mut out = Vec::new();
            flatten_into(obj, "", 0, rules, &mut out);
            out
        }
        JsonValue::Array(_) => vec![FlatField {
            column: "value".to_string(),
            value: FieldValue::Json(value.to_string()),
        }],
        scalar => vec![FlatField {
            column: "value".to_string(),
            value: FieldValue::Scalar(scalar),
        }],
    }
}

fn flatten_into<'a>(
    obj: &'a JsonObject,
    prefix: &str,
    depth: usize,
    rules: &FlattenRules,
    out: &mut Vec<FlatField<'a>>,
) {
    for (key, value) in obj {
        let name = format!("{}{}", prefix, key);

        match value {
            v if is_scalar(v) => out.push(FlatField {
                column: sanitize_column_name(&name),
                value: FieldValue::Scalar(v),
            }),
            JsonValue::Object(nested) => {
                if let Some(items) = list_items(value) {
                    if !is_entity_list(&items) {
                        out.push(json_field(&name, value));
                    }
                } else if is_entity(nested) {
                    continue;
                } else if is_simple(nested, depth + 1, rules) {
                    flatten_into(nested, &format!("{}_", name), depth + 1, rules, out);
                } else {
                    out.push(json_field(&name, value));
                }
            }
            JsonValue::Array(items) => {
                let refs: Vec<&JsonValue> = items.iter().collect();
                if is_entity_list(&refs) {
                    continue;
                }
                if items.iter().all(is_scalar) && items.len() > rules.max_inline_array_len {
                    continue;
                }
                out.push(json_field(&name, value));
            }
            _ => {}
        }
    }
}

fn json_field<'a>(name: &str, value: &JsonValue) -> FlatField<'a> {
    FlatField {
        column: sanitize_column_name(&format!("{}_json", name)),
        value: FieldValue::Json(value.to_string()),
    }
}

/// A nested plain object is hoisted only while it stays shallow, small and
/// free of entity lists.
fn is_simple(obj: &JsonObject, depth: usize, rules: &FlattenRules) -> bool {
    if depth > rules.max_depth {
        return false;
    }
    let mut leaves = 0;
    shape_fits(obj, depth, rules, &mut leaves)
}

fn shape_fits(obj: &JsonObject, depth: usize, rules: &FlattenRules, leaves: &mut usize) -> bool {
    for value in obj.values() {
        match value {
            JsonValue::Object(nested) => {
                if let Some(items) = list_items(value) {
                    if is_entity_list(&items) {
                        return false;
                    }
                    *leaves += 1;
                } else if is_entity(nested) {
                    continue;
                } else if depth + 1 > rules.max_depth {
                    return false;
                } else if !shape_fits(nested, depth + 1, rules, leaves) {
                    return false;
                }
            }
            JsonValue::Array(items) => {
                let refs: Vec<&JsonValue> = items.iter().collect();
                if is_entity_list(&refs) {
                    return false;
                }
                *leaves += 1;
            }
            _ => *leaves += 1,
        }
        if *leaves > rules.max_fields {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn columns(fields: &[FlatField<'_>]) -> Vec<String> {
        fields.iter().map(|f| f.column.clone()).collect()
    }

    #[test]
    fn test_flatten_nested_plain_object() {
        let doc = json!({
            "rcsb_id": "4HHB",
            "struct": {"title": "HEMOGLOBIN"},
            "rcsb_accession_info": {"dates": {"initial": "1984"}}
        });
        let fields = flatten_entity(doc.as_object().unwrap(), &FlattenRules::default());
        assert_eq!(
            columns(&fields),
            vec![
                "rcsb_id",
                "struct_title",
                "rcsb_accession_info_dates_initial"
            ]
        );
        assert_eq!(fields[1].value, FieldValue::Scalar(&json!("HEMOGLOBIN")));
    }

    #[test]
    fn test_flatten_skips_relationships_and_id() {
        let doc = json!({
            "id": 5,
            "name": "x",
            "citation": {"id": "c1"},
            "polymer_entities": [{"rcsb_id": "a"}],
            "entity_ids": ["1", "2"]
        });
        let fields = flatten_entity(doc.as_object().unwrap(), &FlattenRules::default());
        assert_eq!(columns(&fields), vec!["name", "entity_ids_json"]);
        assert_eq!(fields[1].value, FieldValue::Json(r#"["1","2"]"#.to_string()));
    }

    #[test]
    fn test_object_holding_entity_list_is_serialized() {
        let doc = json!({
            "rcsb_id": "x",
            "container": {"meta": {"label": "c"}, "members": [{"id": 1}, {"id": 2}]}
        });
        let fields = flatten_entity(doc.as_object().unwrap(), &FlattenRules::default());
        assert_eq!(columns(&fields), vec!["rcsb_id", "container_json"]);
    }

    #[test]
    fn test_long_scalar_arrays_are_dropped() {
        let long: Vec<i32> = (0..20).collect();
        let doc = json!({"rcsb_id": "x", "short": [1, 2], "long": long});
        let fields = flatten_entity(doc.as_object().unwrap(), &FlattenRules::default());
        assert_eq!(columns(&fields), vec!["rcsb_id", "short_json"]);
    }

    #[test]
    fn test_deep_objects_fall_back_to_json() {
        let rules = FlattenRules { max_inline_array_len: 10, max_depth: 1, max_fields: 32 };
        let doc = json!({"rcsb_id": "x", "a": {"b": {"c": 1}}});
        let fields = flatten_entity(doc.as_object().unwrap(), &rules);
        assert_eq!(columns(&fields), vec!["rcsb_id", "a_json"]);
    }

    #[test]
    fn test_document_rows() {
        let rules = FlattenRules::default();
        assert_eq!(columns(&flatten_document_row(&json!(42), &rules)), vec!["value"]);
        assert_eq!(
            columns(&flatten_document_row(&json!({"meta": {"total": 3}}), &rules)),
            vec!["meta_total"]
        );
    }
}
