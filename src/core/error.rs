use thiserror::Error;

/// Classification of a failed statement, derived from the store's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlErrorKind {
    NoSuchTable,
    NoSuchColumn,
    Syntax,
    Other,
}

/// A statement that passed validation but failed inside the store.
#[derive(Error, Debug, Clone)]
#[error("SQL execution error: {message} (hint: {hint})")]
pub struct SqlExecutionError {
    pub kind: SqlErrorKind,
    pub message: String,
    pub hint: String,
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Schema inference error: {0}")]
    SchemaInference(String),

    #[error("Table creation error: {0}")]
    TableCreation(String),

    #[error("Query type not allowed. Allowed statements: {allowed}")]
    QueryNotAllowed { allowed: String },

    #[error("Forbidden statement: {0}")]
    ForbiddenStatement(String),

    #[error(transparent)]
    SqlExecution(#[from] SqlExecutionError),

    #[error("Dataset '{0}' not found")]
    DatasetNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("I/O error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, StageError>;

impl From<rusqlite::Error> for StageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for StageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<std::io::Error> for StageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StageError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Lock(err.to_string())
    }
}
