//! Document traversal
//!
//! One walk over the document, shared by inference and every insertion
//! phase. Each entity object gets a `NodeId` equal to its pre-order position
//! among entities, which stands in for object identity.

use super::entity::{infer_type_name, is_entity, is_entity_list, list_items, JsonObject};
use log::debug;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    /// A single nested object under one key.
    Single,
    /// One element of an array (or connection) of entities.
    Array,
}

#[derive(Debug, Clone)]
pub struct ParentLink {
    pub parent: NodeId,
    /// Key of the parent field that led to this node, after unwrapping.
    pub via_key: String,
    pub kind: LinkKind,
}

#[derive(Debug)]
pub struct EntityNode<'a> {
    pub id: NodeId,
    pub type_name: String,
    pub object: &'a JsonObject,
    pub parent: Option<ParentLink>,
}

/// Undirected relationship between two entity types, as first observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEdge {
    pub parent_type: String,
    pub child_type: String,
    pub via_key: String,
    pub kind: LinkKind,
}

#[derive(Debug, Default)]
pub struct DocumentGraph<'a> {
    nodes: Vec<EntityNode<'a>>,
    children: Vec<Vec<NodeId>>,
    type_order: Vec<String>,
    by_type: HashMap<String, Vec<NodeId>>,
    edges: Vec<RelationshipEdge>,
    edge_keys: HashSet<(String, String)>,
}

impl<'a> DocumentGraph<'a> {
    /// Walks the whole document and records every entity it contains.
    pub fn scan(document: &'a JsonValue) -> Self {
        let mut graph = Self::default();
        graph.visit(document, None, None, LinkKind::Single);
        debug!(
            "Scanned document: {} entities across {} types, {} relationships",
            graph.nodes.len(),
            graph.type_order.len(),
            graph.edges.len()
        );
        graph
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[EntityNode<'a>] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> &EntityNode<'a> {
        &self.nodes[id]
    }

    /// Entity types in order of first discovery.
    pub fn types(&self) -> &[String] {
        &self.type_order
    }

    pub fn nodes_of_type(&self, type_name: &str) -> impl Iterator<Item = &EntityNode<'a>> {
        self.by_type
            .get(type_name)
            .into_iter()
            .flatten()
            .map(|&id| &self.nodes[id])
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &EntityNode<'a>> {
        self.children[id].iter().map(|&child| &self.nodes[child])
    }

    pub fn edges(&self) -> &[RelationshipEdge] {
        &self.edges
    }

    fn visit(
        &mut self,
        value: &'a JsonValue,
        path_key: Option<&'a str>,
        parent: Option<NodeId>,
        kind: LinkKind,
    ) {
        match value {
            JsonValue::Object(obj) => {
                if let Some(items) = list_items(value) {
                    self.visit_list(&items, path_key, parent);
                } else if is_entity(obj) {
                    let type_name = infer_type_name(obj, path_key);
                    self.visit_entity(obj, type_name, path_key, parent, kind);
                } else {
                    self.visit_fields(obj, parent);
                }
            }
            JsonValue::Array(items) => {
                let items: Vec<&'a JsonValue> = items.iter().collect();
                self.visit_list(&items, path_key, parent);
            }
            _ => {}
        }
    }

    fn visit_list(
        &mut self,
        items: &[&'a JsonValue],
        path_key: Option<&'a str>,
        parent: Option<NodeId>,
    ) {
        if is_entity_list(items) {
            // Every element shares the type inferred for the first one.
            let type_name = items
                .iter()
                .find_map(|v| v.as_object())
                .map(|first| infer_type_name(first, path_key))
                .unwrap_or_default();

            for item in items {
                match item {
                    JsonValue::Object(obj) => {
                        self.visit_entity(obj, type_name.clone(), path_key, parent, LinkKind::Array)
                    }
                    other => self.visit(other, path_key, parent, LinkKind::Array),
                }
            }
        } else {
            for item in items {
                self.visit(item, path_key, parent, LinkKind::Array);
            }
        }
    }

    fn visit_entity(
        &mut self,
        obj: &'a JsonObject,
        type_name: String,
        path_key: Option<&'a str>,
        parent: Option<NodeId>,
        kind: LinkKind,
    ) {
        let id = self.nodes.len();
        let link = parent.map(|p| ParentLink {
            parent: p,
            via_key: path_key.unwrap_or_default().to_string(),
            kind,
        });

        if let Some(link) = &link {
            let parent_type = self.nodes[link.parent].type_name.clone();
            self.record_edge(&parent_type, &type_name, &link.via_key, kind);
            self.children[link.parent].push(id);
        }

        if !self.by_type.contains_key(&type_name) {
            self.type_order.push(type_name.clone());
        }
        self.by_type.entry(type_name.clone()).or_default().push(id);

        self.nodes.push(EntityNode {
            id,
            type_name,
            object: obj,
            parent: link,
        });
        self.children.push(Vec::new());

        self.visit_fields(obj, Some(id));
    }

    fn visit_fields(&mut self, obj: &'a JsonObject, parent: Option<NodeId>) {
        for (key, value) in obj {
            if matches!(value, JsonValue::Object(_) | JsonValue::Array(_)) {
                self.visit(value, Some(key.as_str()), parent, LinkKind::Single);
            }
        }
    }

    fn record_edge(&mut self, parent_type: &str, child_type: &str, via_key: &str, kind: LinkKind) {
        let key = if parent_type <= child_type {
            (parent_type.to_string(), child_type.to_string())
        } else {
            (child_type.to_string(), parent_type.to_string())
        };
        if self.edge_keys.insert(key) {
            debug!(
                "Relationship {} -> {} via '{}' ({:?})",
                parent_type, child_type, via_key, kind
            );
            self.edges.push(RelationshipEdge {
                parent_type: parent_type.to_string(),
                child_type: child_type.to_string(),
                via_key: via_key.to_string(),
                kind,
            });
        }
    }
}
