//! Data Insertion Module
//!
//! Populates inferred tables in three phases over one shared traversal:
//! rows first, then foreign keys, then junction rows. Failures are contained
//! per statement; insertion itself never fails.

use super::converter::{InsertStatementBuilder, JsonToValueConverter, OnConflict, UpdateStatementBuilder};
use super::entity::natural_id;
use super::flatten::{flatten_document_row, flatten_entity, FlatField, FlattenRules};
use super::schema_inference::{document_rows, FALLBACK_TABLE};
use super::traversal::{DocumentGraph, EntityNode, LinkKind, NodeId};
use crate::config::StagingConfig;
use crate::core::{CellValue, PrimaryKey, RowId, SchemaMap, TableKind, TableSchema};
use crate::naming::field_matches_table;
use crate::storage::SqlExecutor;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};

/// Counters of one insertion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertionReport {
    pub rows_inserted: usize,
    /// Repeats of an already stored natural id, merged into its row.
    pub rows_merged: usize,
    pub foreign_keys_resolved: usize,
    pub junction_rows: usize,
    pub failed_statements: usize,
    pub coercion_warnings: usize,
}

/// Identity map of one run: where each entity node was stored.
type IdentityMap = Vec<Option<(String, RowId)>>;

pub struct DataInsertionEngine {
    rules: FlattenRules,
}

impl DataInsertionEngine {
    pub fn new() -> Self {
        Self::with_config(&StagingConfig::default())
    }

    pub fn with_config(config: &StagingConfig) -> Self {
        Self {
            rules: FlattenRules::from_config(config),
        }
    }

    pub fn insert(
        &self,
        document: &JsonValue,
        schemas: &SchemaMap,
        executor: &dyn SqlExecutor,
    ) -> InsertionReport {
        let mut report = InsertionReport::default();
        let graph = DocumentGraph::scan(document);

        if graph.is_empty() {
            if let Some(schema) = schemas.get(FALLBACK_TABLE) {
                self.insert_document_rows(document, schema, executor, &mut report);
            }
        } else {
            let identities = self.insert_entities(&graph, schemas, executor, &mut report);
            self.resolve_foreign_keys(&graph, schemas, &identities, executor, &mut report);
            self.insert_junction_rows(&graph, schemas, &identities, executor, &mut report);
        }

        info!(
            "Inserted {} rows ({} merged), {} foreign keys, {} junction rows ({} failed statements)",
            report.rows_inserted,
            report.rows_merged,
            report.foreign_keys_resolved,
            report.junction_rows,
            report.failed_statements
        );
        report
    }

    /// Phase 1: one row per entity node. The first occurrence of an id
    /// replaces any stored row, later occurrences only fill its NULL columns.
    fn insert_entities(
        &self,
        graph: &DocumentGraph<'_>,
        schemas: &SchemaMap,
        executor: &dyn SqlExecutor,
        report: &mut InsertionReport,
    ) -> IdentityMap {
        let mut identities: IdentityMap = vec![None; graph.nodes().len()];
        let mut counters: HashMap<&str, i64> = HashMap::new();
        let mut stored: HashSet<(&str, RowId)> = HashSet::new();
        let taken = natural_ids(graph, schemas);

        for node in graph.nodes() {
            let Some(schema) = schemas.get(&node.type_name) else {
                continue;
            };

            let counter = counters.entry(schema.name.as_str()).or_insert(0);
            *counter += 1;
            let row_id = match (schema.primary_key, natural_id(node.object)) {
                (PrimaryKey::Natural, Some(id)) => id,
                (PrimaryKey::Natural, None) => {
                    // Counter values already claimed by a natural id are skipped.
                    while taken.contains(&(schema.name.as_str(), RowId::Text(counter.to_string()))) {
                        *counter += 1;
                    }
                    RowId::Text(counter.to_string())
                }
                (PrimaryKey::Surrogate, _) => RowId::Int(*counter),
            };

            let (columns, values) = match schema.kind {
                TableKind::Raw => raw_row(&JsonValue::Object(node.object.clone())),
                _ => {
                    let fields = flatten_entity(node.object, &self.rules);
                    self.typed_row(schema, &fields, report)
                }
            };

            let key = (schema.name.as_str(), row_id.clone());
            let on_conflict = if stored.contains(&key) {
                OnConflict::Merge
            } else {
                OnConflict::Replace
            };

            if self.insert_row(schema, &row_id, columns, values, on_conflict, executor, report) {
                stored.insert(key);
                identities[node.id] = Some((schema.name.clone(), row_id));
            }
        }

        identities
    }

    /// Phase 2: point each foreign key column at the matching singleton child.
    fn resolve_foreign_keys(
        &self,
        graph: &DocumentGraph<'_>,
        schemas: &SchemaMap,
        identities: &IdentityMap,
        executor: &dyn SqlExecutor,
        report: &mut InsertionReport,
    ) {
        for node in graph.nodes() {
            let Some((table, row_id)) = &identities[node.id] else {
                continue;
            };
            let Some(schema) = schemas.get(table) else {
                continue;
            };

            for fk in schema.foreign_keys() {
                let Some(target) = fk.references.as_deref() else {
                    continue;
                };
                let Some(child) = find_singleton_child(graph, node.id, target) else {
                    debug!("{}.{} unresolved for row {}", table, fk.name, row_id);
                    continue;
                };
                let Some((_, child_id)) = &identities[child] else {
                    continue;
                };

                let sql = UpdateStatementBuilder::new(table.clone()).set(fk.name.clone()).build();
                match executor.execute(&sql, &[child_id.to_cell(), row_id.to_cell()]) {
                    Ok(_) => report.foreign_keys_resolved += 1,
                    Err(e) => {
                        warn!("Failed to set {}.{} for row {}: {}", table, fk.name, row_id, e);
                        report.failed_statements += 1;
                    }
                }
            }
        }
    }

    /// Phase 3: one junction row per (entity, related child) pair, seen from
    /// either side of the relationship.
    fn insert_junction_rows(
        &self,
        graph: &DocumentGraph<'_>,
        schemas: &SchemaMap,
        identities: &IdentityMap,
        executor: &dyn SqlExecutor,
        report: &mut InsertionReport,
    ) {
        for junction in schemas.values() {
            let TableKind::Junction { left, right } = &junction.kind else {
                continue;
            };
            let [left_col, right_col] = [&junction.columns[0].name, &junction.columns[1].name];
            let sql = InsertStatementBuilder::new(junction.name.clone())
                .columns(vec![left_col.clone(), right_col.clone()])
                .on_conflict(OnConflict::Ignore)
                .build();

            let mut seen: HashSet<(RowId, RowId)> = HashSet::new();
            let participants = graph
                .nodes_of_type(left)
                .chain(graph.nodes_of_type(right));

            for node in participants {
                let node_is_left = node.type_name == *left;
                let related = if node_is_left { right } else { left };

                for child in graph.children(node.id).filter(|c| c.type_name == *related) {
                    let (Some((_, node_id)), Some((_, child_id))) =
                        (&identities[node.id], &identities[child.id])
                    else {
                        continue;
                    };
                    let pair = if node_is_left {
                        (node_id.clone(), child_id.clone())
                    } else {
                        (child_id.clone(), node_id.clone())
                    };
                    if !seen.insert(pair.clone()) {
                        continue;
                    }

                    match executor.execute(&sql, &[pair.0.to_cell(), pair.1.to_cell()]) {
                        Ok(changed) => report.junction_rows += changed,
                        Err(e) => {
                            warn!("Failed to link {} {} -> {}: {}", junction.name, pair.0, pair.1, e);
                            report.failed_statements += 1;
                        }
                    }
                }
            }
        }
    }

    /// Rows of the fallback table when the document has no entities.
    fn insert_document_rows(
        &self,
        document: &JsonValue,
        schema: &TableSchema,
        executor: &dyn SqlExecutor,
        report: &mut InsertionReport,
    ) {
        for (position, value) in document_rows(document).into_iter().enumerate() {
            let row_id = RowId::Int(position as i64 + 1);
            let (columns, values) = match schema.kind {
                TableKind::Raw => raw_row(value),
                _ => {
                    let fields = flatten_document_row(value, &self.rules);
                    self.typed_row(schema, &fields, report)
                }
            };
            self.insert_row(schema, &row_id, columns, values, OnConflict::Replace, executor, report);
        }
    }

    /// Coerces flattened fields to the schema's column types. Fields with no
    /// column, and repeats of a column, are dropped.
    fn typed_row(
        &self,
        schema: &TableSchema,
        fields: &[FlatField<'_>],
        report: &mut InsertionReport,
    ) -> (Vec<String>, Vec<CellValue>) {
        let mut columns = Vec::new();
        let mut values = Vec::new();
        let mut used = HashSet::new();

        for field in fields {
            let Some(column) = schema.column(&field.column) else {
                continue;
            };
            if column.is_foreign_key() || !used.insert(column.name.as_str()) {
                continue;
            }

            let value = match JsonToValueConverter::convert(&field.value, column.sql_type) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Coercion warning on {}.{}: {}", schema.name, column.name, e);
                    report.coercion_warnings += 1;
                    CellValue::Null
                }
            };
            columns.push(column.name.clone());
            values.push(value);
        }

        (columns, values)
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_row(
        &self,
        schema: &TableSchema,
        row_id: &RowId,
        mut columns: Vec<String>,
        mut values: Vec<CellValue>,
        on_conflict: OnConflict,
        executor: &dyn SqlExecutor,
        report: &mut InsertionReport,
    ) -> bool {
        columns.insert(0, "id".to_string());
        values.insert(0, row_id.to_cell());

        let sql = InsertStatementBuilder::new(schema.name.clone())
            .columns(columns)
            .on_conflict(on_conflict)
            .build();

        match executor.execute(&sql, &values) {
            Ok(_) => {
                if on_conflict == OnConflict::Merge {
                    report.rows_merged += 1;
                } else {
                    report.rows_inserted += 1;
                }
                true
            }
            Err(e) => {
                warn!("Failed to insert row {} into '{}': {}", row_id, schema.name, e);
                report.failed_statements += 1;
                false
            }
        }
    }
}

impl Default for DataInsertionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Natural ids present in the document, per natural-key table.
fn natural_ids<'a>(graph: &DocumentGraph<'_>, schemas: &'a SchemaMap) -> HashSet<(&'a str, RowId)> {
    graph
        .nodes()
        .iter()
        .filter_map(|node| {
            let schema = schemas.get(&node.type_name)?;
            if schema.primary_key != PrimaryKey::Natural {
                return None;
            }
            Some((schema.name.as_str(), natural_id(node.object)?))
        })
        .collect()
}

fn raw_row(value: &JsonValue) -> (Vec<String>, Vec<CellValue>) {
    (
        vec!["data_json".to_string()],
        vec![CellValue::Text(value.to_string())],
    )
}

/// The singleton child of `target` type for a foreign key: the one reached
/// through a key naming the target, otherwise the first one.
fn find_singleton_child(graph: &DocumentGraph<'_>, parent: NodeId, target: &str) -> Option<NodeId> {
    let candidates: Vec<&EntityNode<'_>> = graph
        .children(parent)
        .filter(|c| c.type_name == target)
        .filter(|c| matches!(&c.parent, Some(link) if link.kind == LinkKind::Single))
        .collect();

    candidates
        .iter()
        .find(|c| {
            c.parent
                .as_ref()
                .is_some_and(|link| field_matches_table(&link.via_key, target))
        })
        .or_else(|| candidates.first())
        .map(|c| c.id)
}
