pub mod error;
pub mod types;
pub mod value;

pub use error::{Result, SqlErrorKind, SqlExecutionError, StageError};
pub use types::{
    normalize_type_name, Column, PrimaryKey, Relationship, Row, SchemaMap, SqlType, TableKind,
    TableSchema,
};
pub use value::{CellValue, RowId};
