// ============================================================================
// stagedb Library
// ============================================================================

pub mod config;
pub mod core;
pub mod gateway;
pub mod json;
pub mod naming;
pub mod result;
pub mod storage;

// Re-export main types for convenience
pub use crate::config::{StagingConfig, StorageMode};
pub use crate::core::{Result, SchemaMap, SqlErrorKind, SqlExecutionError, SqlType, StageError, TableSchema};
pub use gateway::{GatewayResult, QueryType, SqlGateway};
pub use json::{
    DataInsertionEngine, InsertionReport, ProcessingSummary, SchemaInferenceEngine, StagingEngine,
    TableSummary,
};
pub use result::QueryResult;
pub use storage::{Dataset, DatasetInfo, DatasetRegistry, SqlExecutor, TableInfo};

/// Stage one document into a fresh in-memory dataset.
///
/// Shorthand for tools and tests that need a single dataset without a
/// registry.
///
/// # Example
/// ```ignore
/// let (dataset, summary) = stagedb::stage_document(&json!({"entries": [{"rcsb_id": "A"}]}))?;
/// assert_eq!(summary.total_rows, 1);
/// ```
pub fn stage_document(document: &serde_json::Value) -> Result<(Dataset, ProcessingSummary)> {
    StagingEngine::validate_document(document)?;
    let dataset = Dataset::open_in_memory()?;
    let summary = StagingEngine::new().stage(&dataset, document)?;
    Ok((dataset, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_document_and_query() {
        let (dataset, summary) = stage_document(&json!({
            "entries": [{"rcsb_id": "A", "resolution": 1.8}, {"rcsb_id": "B", "resolution": 2.4}]
        }))
        .unwrap();
        assert_eq!(summary.total_rows, 2);

        let result = SqlGateway::new()
            .execute(&dataset, "SELECT id FROM entry WHERE resolution < 2")
            .unwrap();
        assert_eq!(result.row_count, 1);
        assert_eq!(result.rows[0]["id"], json!("A"));
    }
}
