//! SQL Gateway
//!
//! Validates, executes and annotates user statements against a dataset.

pub mod diagnostics;
pub mod validator;

pub use validator::{normalize, QueryType, QueryValidator, ValidationRule, ALLOWED_PREFIXES};

use crate::config::StagingConfig;
use crate::core::Result;
use crate::result::QueryResult;
use crate::storage::SqlExecutor;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref LIMIT_CLAUSE: Regex = Regex::new(r"\blimit\s+\S+").unwrap();
}

/// Result of one gateway statement
#[derive(Debug, Clone, Serialize)]
pub struct GatewayResult {
    pub query_type: QueryType,
    pub columns: Vec<String>,
    pub rows: Vec<crate::core::Row>,
    pub row_count: usize,
    pub warnings: Vec<String>,
}

impl GatewayResult {
    pub fn into_query_result(self) -> QueryResult {
        QueryResult::new(self.columns, self.rows)
    }
}

pub struct SqlGateway {
    validator: QueryValidator,
    large_result_hint_rows: usize,
}

impl SqlGateway {
    pub fn new() -> Self {
        Self::with_config(&StagingConfig::default())
    }

    pub fn with_config(config: &StagingConfig) -> Self {
        Self {
            validator: QueryValidator::new(),
            large_result_hint_rows: config.large_result_hint_rows,
        }
    }

    /// Validate and run `sql`. Nothing reaches the store unless validation
    /// passes.
    pub fn execute(&self, executor: &dyn SqlExecutor, sql: &str) -> Result<GatewayResult> {
        let query_type = self.validator.validate(sql)?;
        let statement = sql.trim().trim_end_matches(';').trim_end();
        debug!("Executing {} statement: {}", query_type, statement);

        let result = executor.query(statement, &[]).map_err(|e| {
            let tables = executor.table_names().unwrap_or_default();
            diagnostics::diagnose(e, &tables)
        })?;

        let mut warnings = Vec::new();
        if query_type.is_read()
            && result.row_count() > self.large_result_hint_rows
            && !LIMIT_CLAUSE.is_match(&normalize(statement))
        {
            warnings.push(format!(
                "Query returned {} rows; consider adding a LIMIT clause",
                result.row_count()
            ));
        }

        Ok(GatewayResult {
            query_type,
            row_count: result.row_count(),
            columns: result.columns,
            rows: result.rows,
            warnings,
        })
    }
}

impl Default for SqlGateway {
    fn default() -> Self {
        Self::new()
    }
}
