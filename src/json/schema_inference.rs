//! Schema Inference Module
//!
//! Derives one table per entity type, foreign keys for singleton nested
//! entities and junction tables for arrays of entities. Documents without
//! entities fall back to a single `data` table.
//!
//! Whether a relationship becomes a foreign key or a junction table depends
//! only on how it was first observed (nested object vs. array). Cardinality
//! is never checked against the data.

use super::classifier::{classify_field, union_types};
use super::entity::natural_id;
use super::flatten::{flatten_document_row, flatten_entity, FieldValue, FlatField, FlattenRules};
use super::traversal::{DocumentGraph, EntityNode, LinkKind};
use crate::config::StagingConfig;
use crate::core::{
    Column, PrimaryKey, Relationship, Row, SchemaMap, SqlType, TableKind, TableSchema,
};
use crate::naming::{foreign_key_column, junction_name};
use log::debug;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Name of the table used when a document contains no entities.
pub const FALLBACK_TABLE: &str = "data";

/// Accumulates type votes per column, remembering first-seen order.
#[derive(Debug, Default)]
struct ColumnCollector {
    order: Vec<String>,
    votes: HashMap<String, Vec<SqlType>>,
}

impl ColumnCollector {
    fn observe(&mut self, field: &FlatField<'_>) {
        let vote = match &field.value {
            FieldValue::Scalar(value) => classify_field(&field.column, value),
            FieldValue::Json(_) => Some(SqlType::Json),
        };

        if !self.votes.contains_key(&field.column) {
            self.order.push(field.column.clone());
        }
        let votes = self.votes.entry(field.column.clone()).or_default();
        if let Some(t) = vote {
            votes.push(t);
        }
    }

    fn finish(self) -> Vec<Column> {
        let Self { order, mut votes } = self;
        order
            .into_iter()
            .map(|name| {
                let observed = votes.remove(&name).unwrap_or_default();
                let sql_type = union_types(observed);
                Column::new(name, sql_type)
            })
            .collect()
    }
}

fn sample_row(id: JsonValue, fields: &[FlatField<'_>]) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), id);
    for field in fields {
        row.insert(field.column.clone(), field.value.to_json());
    }
    row
}

/// Schema inference engine
pub struct SchemaInferenceEngine {
    rules: FlattenRules,
    sample_size: usize,
}

impl SchemaInferenceEngine {
    pub fn new() -> Self {
        Self::with_config(&StagingConfig::default())
    }

    pub fn with_config(config: &StagingConfig) -> Self {
        Self {
            rules: FlattenRules::from_config(config),
            sample_size: config.sample_size,
        }
    }

    /// Infer table schemas for a whole document. Never fails: documents
    /// without entities degrade to the fallback table, and documents without
    /// any usable values yield an empty map.
    pub fn infer(&self, document: &JsonValue) -> SchemaMap {
        let graph = DocumentGraph::scan(document);
        if graph.is_empty() {
            debug!("No entities found, using fallback '{}' table", FALLBACK_TABLE);
            return self.infer_document_table(document);
        }
        self.infer_from_graph(&graph)
    }

    /// Infer schemas from an already scanned document.
    pub fn infer_from_graph(&self, graph: &DocumentGraph<'_>) -> SchemaMap {
        let mut schemas = SchemaMap::new();

        for type_name in graph.types() {
            let nodes: Vec<&EntityNode<'_>> = graph.nodes_of_type(type_name).collect();
            let schema = self.build_entity_table(type_name, &nodes);
            schemas.insert(type_name.clone(), schema);
        }

        self.add_foreign_keys(graph, &mut schemas);
        self.add_junction_tables(graph, &mut schemas);

        debug!(
            "Inferred {} tables: {:?}",
            schemas.len(),
            schemas.keys().collect::<Vec<_>>()
        );
        schemas
    }

    fn build_entity_table(&self, type_name: &str, nodes: &[&EntityNode<'_>]) -> TableSchema {
        let primary_key = if nodes.iter().any(|n| natural_id(n.object).is_some()) {
            PrimaryKey::Natural
        } else {
            PrimaryKey::Surrogate
        };

        let mut schema = TableSchema::new(type_name, TableKind::Entity, primary_key);
        let mut collector = ColumnCollector::default();

        for (position, node) in nodes.iter().enumerate() {
            let fields = flatten_entity(node.object, &self.rules);

            if position < self.sample_size {
                let id = match natural_id(node.object) {
                    Some(id) => JsonValue::String(id.to_string()),
                    None => JsonValue::from(position as i64 + 1),
                };
                schema.sample_rows.push(sample_row(id, &fields));
            }

            for field in &fields {
                collector.observe(field);
            }
        }

        schema.columns = collector.finish();
        schema
    }

    fn add_foreign_keys(&self, graph: &DocumentGraph<'_>, schemas: &mut SchemaMap) {
        for edge in graph.edges().iter().filter(|e| e.kind == LinkKind::Single) {
            let column = foreign_key_column(&edge.child_type);
            let Some(schema) = schemas.get_mut(&edge.parent_type) else {
                continue;
            };

            if schema.has_column(&column) {
                debug!(
                    "Table '{}' already has a data column '{}', no foreign key to '{}'",
                    schema.name, column, edge.child_type
                );
                continue;
            }

            schema
                .columns
                .push(Column::foreign_key(column.clone(), edge.child_type.clone()));
            schema.relationships.push(Relationship::ForeignKey {
                column,
                target: edge.child_type.clone(),
            });
        }
    }

    fn add_junction_tables(&self, graph: &DocumentGraph<'_>, schemas: &mut SchemaMap) {
        let array_edges = graph
            .edges()
            .iter()
            .filter(|e| e.kind == LinkKind::Array);

        for edge in array_edges {
            if edge.parent_type == edge.child_type {
                debug!("Skipping self relationship on '{}'", edge.parent_type);
                continue;
            }

            let (left, right) = if edge.parent_type <= edge.child_type {
                (edge.parent_type.clone(), edge.child_type.clone())
            } else {
                (edge.child_type.clone(), edge.parent_type.clone())
            };

            let mut name = junction_name(&left, &right);
            while schemas.contains_key(&name) {
                name.push_str("_link");
            }

            let mut junction = TableSchema::new(
                name.clone(),
                TableKind::Junction {
                    left: left.clone(),
                    right: right.clone(),
                },
                PrimaryKey::Surrogate,
            );
            for target in [&left, &right] {
                let column = foreign_key_column(target);
                junction.columns.push(Column::foreign_key(column.clone(), target.clone()));
                junction.relationships.push(Relationship::ForeignKey {
                    column,
                    target: target.clone(),
                });
            }

            for (owner, related) in [(&left, &right), (&right, &left)] {
                if let Some(schema) = schemas.get_mut(owner) {
                    schema.relationships.push(Relationship::Junction {
                        table: name.clone(),
                        related: related.clone(),
                    });
                }
            }

            schemas.insert(name, junction);
        }
    }

    fn infer_document_table(&self, document: &JsonValue) -> SchemaMap {
        let mut schema = TableSchema::new(FALLBACK_TABLE, TableKind::Document, PrimaryKey::Surrogate);
        let mut collector = ColumnCollector::default();

        for (position, row) in document_rows(document).into_iter().enumerate() {
            let fields: Vec<FlatField<'_>> = flatten_document_row(row, &self.rules)
                .into_iter()
                .filter(|f| !matches!(f.value, FieldValue::Scalar(JsonValue::Null)))
                .collect();

            if position < self.sample_size && !fields.is_empty() {
                schema
                    .sample_rows
                    .push(sample_row(JsonValue::from(position as i64 + 1), &fields));
            }
            for field in &fields {
                collector.observe(field);
            }
        }

        schema.columns = collector.finish();

        let mut schemas = SchemaMap::new();
        if !schema.columns.is_empty() {
            schemas.insert(FALLBACK_TABLE.to_string(), schema);
        }
        schemas
    }
}

impl Default for SchemaInferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Rows of the fallback table: the root object, or each non-null element
/// of a root array, or a root scalar.
pub fn document_rows(document: &JsonValue) -> Vec<&JsonValue> {
    match document {
        JsonValue::Null => Vec::new(),
        JsonValue::Array(items) => items.iter().filter(|v| !v.is_null()).collect(),
        other => vec![other],
    }
}
