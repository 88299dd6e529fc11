use rusqlite::types::{ToSql, ToSqlOutput, Value as SqliteValue, ValueRef};
use serde_json::Value as JsonValue;
use std::fmt;

/// A value bound to, or read back from, the store.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl CellValue {
    pub fn to_json(&self) -> JsonValue {
        match self {
            CellValue::Null => JsonValue::Null,
            CellValue::Integer(i) => JsonValue::Number((*i).into()),
            CellValue::Real(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            CellValue::Text(s) => JsonValue::String(s.clone()),
            CellValue::Blob(bytes) => JsonValue::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "NULL"),
            CellValue::Integer(i) => write!(f, "{}", i),
            CellValue::Real(r) => write!(f, "{}", r),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(i) => CellValue::Integer(i),
            ValueRef::Real(f) => CellValue::Real(f),
            ValueRef::Text(bytes) => CellValue::Text(String::from_utf8_lossy(bytes).into_owned()),
            ValueRef::Blob(bytes) => CellValue::Blob(bytes.to_vec()),
        }
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(SqliteValue::Null),
            CellValue::Integer(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            CellValue::Real(f) => ToSqlOutput::Owned(SqliteValue::Real(*f)),
            CellValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            CellValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// Primary key value of a staged row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowId {
    Int(i64),
    Text(String),
}

impl RowId {
    pub fn to_cell(&self) -> CellValue {
        match self {
            RowId::Int(i) => CellValue::Integer(*i),
            RowId::Text(s) => CellValue::Text(s.clone()),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Int(i) => write!(f, "{}", i),
            RowId::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_to_json() {
        assert_eq!(CellValue::Integer(7).to_json(), serde_json::json!(7));
        assert_eq!(CellValue::Text("x".into()).to_json(), serde_json::json!("x"));
        assert_eq!(CellValue::Real(f64::NAN).to_json(), JsonValue::Null);
        assert_eq!(CellValue::Null.to_json(), JsonValue::Null);
    }

    #[test]
    fn test_row_id_cells() {
        assert_eq!(RowId::Int(3).to_cell(), CellValue::Integer(3));
        assert_eq!(RowId::Text("4HHB".into()).to_cell(), CellValue::Text("4HHB".into()));
    }
}
