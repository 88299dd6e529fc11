//! Entity rules
//!
//! Which JSON objects become rows, how GraphQL connection wrappers are seen
//! through, and what a row's table is called.

use crate::core::RowId;
use crate::naming::entity_type_name;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

pub type JsonObject = Map<String, JsonValue>;

/// Fields that mark an object as a row on their own.
pub const ID_FIELDS: &[&str] = &["id", "_id", "rcsb_id"];

const DESCRIPTIVE_FIELDS: &[&str] = &[
    "name", "title", "description", "type", "formula", "sequence", "value",
];

/// GraphQL structural words that never name an entity type.
const WRAPPER_KEYWORDS: &[&str] = &[
    "edges", "node", "nodes", "data", "items", "results", "pageinfo", "page_info", "connection",
    "list", "object", "array",
];

const CONNECTION_EXTRAS: &[&str] = &["pageInfo", "page_info", "totalCount", "total_count"];

lazy_static! {
    static ref TYPE_TAG: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap();

    /// Domain fields that identify an entity type when an object carries an
    /// id-like field but no tag or path.
    static ref STRUCTURAL_HINTS: Vec<(&'static str, &'static str)> = vec![
        ("rcsb_entry_info", "entry"),
        ("rcsb_entry_container_identifiers", "entry"),
        ("exptl", "entry"),
        ("struct", "entry"),
        ("entity_poly", "polymer_entity"),
        ("rcsb_polymer_entity", "polymer_entity"),
        ("rcsb_polymer_entity_container_identifiers", "polymer_entity"),
        ("nonpolymer_comp", "nonpolymer_entity"),
        ("rcsb_nonpolymer_entity", "nonpolymer_entity"),
        ("rcsb_branched_entity", "branched_entity"),
        ("pdbx_struct_assembly", "assembly"),
        ("rcsb_assembly_info", "assembly"),
        ("chem_comp", "chem_comp"),
        ("rcsb_chem_comp_info", "chem_comp"),
        ("rcsb_uniprot_protein", "uniprot"),
    ];
}

pub fn is_scalar(value: &JsonValue) -> bool {
    !matches!(value, JsonValue::Array(_) | JsonValue::Object(_))
}

/// Whether an object represents a relational row. Depends only on the
/// object's own keys and values.
pub fn is_entity(obj: &JsonObject) -> bool {
    if ID_FIELDS.iter().any(|f| obj.contains_key(*f)) {
        return true;
    }
    if obj.len() >= 3 && DESCRIPTIVE_FIELDS.iter().any(|f| obj.contains_key(*f)) {
        return true;
    }
    obj.len() >= 2 && obj.values().any(is_scalar)
}

/// Node list of a GraphQL connection (`{edges: [{node}]}` or `{nodes: [...]}`).
pub fn connection_nodes(obj: &JsonObject) -> Option<Vec<&JsonValue>> {
    if let Some(JsonValue::Array(edges)) = obj.get("edges") {
        let all_wrapped = edges
            .iter()
            .all(|e| e.as_object().is_some_and(|o| o.contains_key("node")));
        if all_wrapped {
            return Some(edges.iter().filter_map(|e| e.get("node")).collect());
        }
    }

    if let Some(JsonValue::Array(nodes)) = obj.get("nodes") {
        let only_extras = obj
            .keys()
            .all(|k| k == "nodes" || CONNECTION_EXTRAS.contains(&k.as_str()));
        if only_extras {
            return Some(nodes.iter().collect());
        }
    }
    None
}

/// The items of an array-like value: array elements or connection nodes.
pub fn list_items(value: &JsonValue) -> Option<Vec<&JsonValue>> {
    match value {
        JsonValue::Array(items) => Some(items.iter().collect()),
        JsonValue::Object(obj) => connection_nodes(obj),
        _ => None,
    }
}

/// Whether a list holds entities, judged by its first object element.
pub fn is_entity_list(items: &[&JsonValue]) -> bool {
    items
        .iter()
        .find_map(|v| v.as_object())
        .is_some_and(is_entity)
}

fn is_wrapper_keyword(word: &str) -> bool {
    WRAPPER_KEYWORDS.contains(&word.to_ascii_lowercase().as_str())
}

/// Explicit type tag: `__typename`, or a `type` whose value reads as a name.
pub fn type_tag(obj: &JsonObject) -> Option<&str> {
    if let Some(JsonValue::String(tag)) = obj.get("__typename") {
        if !tag.is_empty() {
            return Some(tag);
        }
    }
    match obj.get("type") {
        Some(JsonValue::String(tag)) if TYPE_TAG.is_match(tag) && !is_wrapper_keyword(tag) => {
            Some(tag)
        }
        _ => None,
    }
}

fn structural_hint(obj: &JsonObject) -> Option<&'static str> {
    if !ID_FIELDS.iter().any(|f| obj.contains_key(*f)) {
        return None;
    }
    STRUCTURAL_HINTS
        .iter()
        .find(|(field, _)| obj.contains_key(*field))
        .map(|(_, type_name)| *type_name)
}

/// Stable fallback name. The suffix is derived from the object's key set so
/// every traversal of the same document agrees on it.
fn fallback_type_name(obj: &JsonObject) -> String {
    let keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, keys.join(",").as_bytes()).simple().to_string();
    format!("entity_{}", &digest[..8])
}

/// Table name for an entity found under `path_key` (None at the root).
pub fn infer_type_name(obj: &JsonObject, path_key: Option<&str>) -> String {
    if let Some(tag) = type_tag(obj) {
        return entity_type_name(tag);
    }
    if let Some(key) = path_key.filter(|k| !is_wrapper_keyword(k)) {
        let name = entity_type_name(key);
        if !name.is_empty() {
            return name;
        }
    }
    if let Some(hint) = structural_hint(obj) {
        return hint.to_string();
    }
    fallback_type_name(obj)
}

/// The object's own identifier, if it carries a scalar one.
pub fn natural_id(obj: &JsonObject) -> Option<RowId> {
    ID_FIELDS.iter().find_map(|f| match obj.get(*f)? {
        JsonValue::String(s) if !s.is_empty() => Some(RowId::Text(s.clone())),
        JsonValue::Number(n) => Some(RowId::Text(n.to_string())),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: JsonValue) -> JsonObject {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_entity_rules() {
        assert!(is_entity(&obj(json!({"rcsb_id": "4HHB"}))));
        assert!(is_entity(&obj(json!({"_id": {"$oid": "x"}}))));
        assert!(is_entity(&obj(json!({"title": {}, "a": [], "b": []}))));
        assert!(is_entity(&obj(json!({"a": 1, "b": {}}))));
        assert!(is_entity(&obj(json!({"a": null, "b": []}))));

        assert!(!is_entity(&obj(json!({"title": "HEMOGLOBIN"}))));
        assert!(!is_entity(&obj(json!({"a": {}, "b": []}))));
        assert!(!is_entity(&obj(json!({}))));
    }

    #[test]
    fn test_entity_rule_ignores_key_order() {
        let a = obj(json!({"x": [], "y": 2}));
        let b = obj(json!({"y": 2, "x": []}));
        assert_eq!(is_entity(&a), is_entity(&b));
    }

    #[test]
    fn test_connection_unwrap() {
        let conn = obj(json!({
            "edges": [{"node": {"id": 1}}, {"node": {"id": 2}}],
            "pageInfo": {"hasNextPage": false}
        }));
        let nodes = connection_nodes(&conn).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1]["id"], json!(2));

        let flat = obj(json!({"nodes": [{"id": 1}], "totalCount": 1}));
        assert_eq!(connection_nodes(&flat).unwrap().len(), 1);

        assert!(connection_nodes(&obj(json!({"nodes": [], "name": "x"}))).is_none());
    }

    #[test]
    fn test_type_name_priority() {
        let tagged = obj(json!({"__typename": "CoreEntry", "rcsb_id": "1ABC"}));
        assert_eq!(infer_type_name(&tagged, Some("entries")), "core_entry");

        let type_word = obj(json!({"id": 1, "type": "Ligand"}));
        assert_eq!(infer_type_name(&type_word, Some("things")), "ligand");

        let type_phrase = obj(json!({"id": 1, "type": "polypeptide(L)"}));
        assert_eq!(infer_type_name(&type_phrase, Some("polymer_entities")), "polymer_entity");

        let hinted = obj(json!({"rcsb_id": "4HHB", "struct": {"title": "x"}}));
        assert_eq!(infer_type_name(&hinted, None), "entry");
        assert_eq!(infer_type_name(&hinted, Some("node")), "entry");

        let anonymous = obj(json!({"a": 1, "b": 2}));
        let name = infer_type_name(&anonymous, None);
        assert!(name.starts_with("entity_"));
        assert_eq!(name, infer_type_name(&anonymous, None));
    }

    #[test]
    fn test_natural_id() {
        assert_eq!(natural_id(&obj(json!({"rcsb_id": "A"}))), Some(RowId::Text("A".into())));
        assert_eq!(natural_id(&obj(json!({"id": 7}))), Some(RowId::Text("7".into())));
        assert_eq!(natural_id(&obj(json!({"id": {"x": 1}}))), None);
        assert_eq!(natural_id(&obj(json!({"name": "x"}))), None);
    }
}
