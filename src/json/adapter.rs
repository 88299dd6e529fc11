//! JSON Staging Adapter
//!
//! Main facade turning one JSON document into populated tables of a
//! dataset: validation, schema inference, table creation and insertion.

use super::converter::CreateTableBuilder;
use super::insertion::{DataInsertionEngine, InsertionReport};
use super::schema_inference::SchemaInferenceEngine;
use crate::config::StagingConfig;
use crate::core::{Result, Row, SchemaMap, StageError, TableSchema};
use crate::storage::{Dataset, SqlExecutor};
use log::{info, warn};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Per-table part of a processing summary
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub name: String,
    pub columns: Vec<String>,
    pub row_count: usize,
    pub sample_rows: Vec<Row>,
}

/// Outcome of staging one document
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingSummary {
    pub access_id: String,
    pub success: bool,
    pub tables_created: usize,
    pub total_rows: usize,
    pub tables: Vec<TableSummary>,
    pub insertion: InsertionReport,
}

/// Staging engine - Facade over inference, DDL and insertion
pub struct StagingEngine {
    schema_engine: SchemaInferenceEngine,
    insertion_engine: DataInsertionEngine,
}

impl StagingEngine {
    pub fn new() -> Self {
        Self::with_config(&StagingConfig::default())
    }

    pub fn with_config(config: &StagingConfig) -> Self {
        Self {
            schema_engine: SchemaInferenceEngine::with_config(config),
            insertion_engine: DataInsertionEngine::with_config(config),
        }
    }

    /// Rejects documents with nothing to stage: `null`, `{}` and `[]`.
    pub fn validate_document(document: &JsonValue) -> Result<()> {
        let empty = match document {
            JsonValue::Null => true,
            JsonValue::Object(obj) => obj.is_empty(),
            JsonValue::Array(items) => items.is_empty(),
            _ => false,
        };

        if empty {
            return Err(StageError::Validation(
                "document is empty, nothing to stage".to_string(),
            ));
        }
        Ok(())
    }

    /// Stage a document into `dataset`
    ///
    /// # Example
    /// ```ignore
    /// let summary = engine.stage(&dataset, &json!({
    ///     "entry": {"rcsb_id": "4HHB", "struct": {"title": "HEMOGLOBIN"}}
    /// }))?;
    /// assert_eq!(summary.tables[0].name, "entry");
    /// ```
    pub fn stage(&self, dataset: &Dataset, document: &JsonValue) -> Result<ProcessingSummary> {
        Self::validate_document(document)?;

        let schemas = self.schema_engine.infer(document);
        if schemas.is_empty() {
            if holds_data(document) {
                return Err(StageError::SchemaInference(
                    "document holds values but no table could be derived from them".to_string(),
                ));
            }
            info!("Dataset {}: document holds no data, no tables created", dataset.access_id());
            return self.summarize(dataset, &SchemaMap::new(), InsertionReport::default());
        }

        let created = self.create_tables(dataset, &schemas)?;

        dataset.begin()?;
        let report = self.insertion_engine.insert(document, &created, dataset);
        if let Err(e) = dataset.commit() {
            let _ = dataset.rollback();
            return Err(e);
        }

        let summary = self.summarize(dataset, &created, report)?;
        info!(
            "Dataset {}: staged {} rows into {} tables",
            summary.access_id, summary.total_rows, summary.tables_created
        );
        Ok(summary)
    }

    /// Creates every table, replacing a table whose DDL fails by its raw
    /// `id` + `data_json` form. Returns the schemas actually created.
    fn create_tables(&self, dataset: &Dataset, schemas: &SchemaMap) -> Result<SchemaMap> {
        let mut created = SchemaMap::new();

        for (name, schema) in schemas {
            if try_create(dataset, schema) {
                created.insert(name.clone(), schema.clone());
                continue;
            }

            let fallback = TableSchema::raw_fallback(schema.name.clone(), schema.primary_key);
            warn!("Falling back to raw JSON storage for table '{}'", name);
            if try_create(dataset, &fallback) {
                created.insert(name.clone(), fallback);
            }
        }

        if created.is_empty() {
            return Err(StageError::TableCreation(format!(
                "none of {} tables could be created",
                schemas.len()
            )));
        }
        Ok(created)
    }

    fn summarize(
        &self,
        dataset: &Dataset,
        schemas: &SchemaMap,
        insertion: InsertionReport,
    ) -> Result<ProcessingSummary> {
        let mut tables = Vec::with_capacity(schemas.len());
        for schema in schemas.values() {
            tables.push(TableSummary {
                name: schema.name.clone(),
                columns: schema.column_names(),
                row_count: dataset.row_count(&schema.name)?,
                sample_rows: schema.sample_rows.clone(),
            });
        }

        Ok(ProcessingSummary {
            access_id: dataset.access_id().to_string(),
            success: true,
            tables_created: tables.len(),
            total_rows: tables.iter().map(|t| t.row_count).sum(),
            tables,
            insertion,
        })
    }
}

impl Default for StagingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn try_create(dataset: &Dataset, schema: &TableSchema) -> bool {
    let ddl = CreateTableBuilder::from_schema(schema).build();
    match dataset.execute_batch(&ddl) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to create table '{}': {}", schema.name, e);
            false
        }
    }
}

/// Whether any non-null scalar occurs anywhere in the document.
fn holds_data(value: &JsonValue) -> bool {
    match value {
        JsonValue::Null => false,
        JsonValue::Array(items) => items.iter().any(holds_data),
        JsonValue::Object(obj) => obj.values().any(holds_data),
        _ => true,
    }
}
