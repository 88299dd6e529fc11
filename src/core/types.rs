use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;

/// A staged row as seen by samples and query results: column name to value,
/// in column order.
pub type Row = Map<String, JsonValue>;

/// Inferred schemas keyed by table name.
pub type SchemaMap = BTreeMap<String, TableSchema>;

/// Column affinity assigned by inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SqlType {
    Integer,
    Real,
    Text,
    Date,
    DateTime,
    Blob,
    Json,
}

impl SqlType {
    /// Rank used when several types were observed for one column.
    /// DATE > DATETIME > TEXT > JSON > REAL > INTEGER > BLOB.
    pub fn priority(self) -> u8 {
        match self {
            SqlType::Date => 6,
            SqlType::DateTime => 5,
            SqlType::Text => 4,
            SqlType::Json => 3,
            SqlType::Real => 2,
            SqlType::Integer => 1,
            SqlType::Blob => 0,
        }
    }

    /// The type name emitted in DDL, restricted to what the store accepts:
    /// INTEGER, REAL, TEXT, BLOB, NUMERIC or JSON.
    pub fn storage_type(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
            SqlType::Text | SqlType::Date | SqlType::DateTime | SqlType::Json => "TEXT",
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(
            self,
            SqlType::Text | SqlType::Date | SqlType::DateTime | SqlType::Json
        )
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Text => "TEXT",
            SqlType::Date => "DATE",
            SqlType::DateTime => "DATETIME",
            SqlType::Blob => "BLOB",
            SqlType::Json => "JSON",
        };
        write!(f, "{}", name)
    }
}

/// Maps an arbitrary declared type name onto the store vocabulary.
pub fn normalize_type_name(declared: &str) -> &'static str {
    let upper = declared.trim().to_ascii_uppercase();
    let base = upper.split(['(', ' ']).next().unwrap_or("");

    match base {
        "INT" | "INTEGER" | "BIGINT" | "SMALLINT" | "TINYINT" | "BOOLEAN" | "BOOL" => "INTEGER",
        "REAL" | "FLOAT" | "DOUBLE" => "REAL",
        "NUMERIC" | "DECIMAL" | "NUMBER" => "NUMERIC",
        "BLOB" | "BYTEA" | "BINARY" => "BLOB",
        "JSON" | "JSONB" => "JSON",
        _ => "TEXT",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    /// Target table when this column is a foreign key.
    pub references: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            references: None,
        }
    }

    pub fn foreign_key(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: SqlType::Integer,
            references: Some(target.into()),
        }
    }

    pub fn is_foreign_key(&self) -> bool {
        self.references.is_some()
    }
}

/// How the `id` column of a table is populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKey {
    /// Run-local counter, `INTEGER PRIMARY KEY`.
    Surrogate,
    /// Taken from the object's own `id`/`_id`/`rcsb_id`, `TEXT PRIMARY KEY`.
    Natural,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableKind {
    /// One row per discovered entity object.
    Entity,
    /// Pairs of row ids for an array relationship.
    Junction { left: String, right: String },
    /// No entities in the document: rows come from the root itself.
    Document,
    /// DDL fallback: `id` plus the whole source object in `data_json`.
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Relationship {
    ForeignKey { column: String, target: String },
    Junction { table: String, related: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub kind: TableKind,
    pub primary_key: PrimaryKey,
    /// Data and foreign key columns, in discovery order. The `id` column is
    /// implied by `primary_key` and never listed here.
    pub columns: Vec<Column>,
    pub relationships: Vec<Relationship>,
    pub sample_rows: Vec<Row>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, kind: TableKind, primary_key: PrimaryKey) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key,
            columns: Vec::new(),
            relationships: Vec::new(),
            sample_rows: Vec::new(),
        }
    }

    /// Minimal `id` + `data_json` replacement used when the real DDL fails.
    pub fn raw_fallback(name: impl Into<String>, primary_key: PrimaryKey) -> Self {
        let mut schema = Self::new(name, TableKind::Raw, primary_key);
        schema.columns.push(Column::new("data_json", SqlType::Json));
        schema
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_foreign_key())
    }

    pub fn column_names(&self) -> Vec<String> {
        std::iter::once("id".to_string())
            .chain(self.columns.iter().map(|c| c.name.clone()))
            .collect()
    }

    pub fn is_junction(&self) -> bool {
        matches!(self.kind, TableKind::Junction { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        let ordered = [
            SqlType::Date,
            SqlType::DateTime,
            SqlType::Text,
            SqlType::Json,
            SqlType::Real,
            SqlType::Integer,
        ];
        for pair in ordered.windows(2) {
            assert!(pair[0].priority() > pair[1].priority());
        }
    }

    #[test]
    fn test_storage_type_vocabulary() {
        assert_eq!(SqlType::Date.storage_type(), "TEXT");
        assert_eq!(SqlType::Json.storage_type(), "TEXT");
        assert_eq!(SqlType::Real.storage_type(), "REAL");
        assert_eq!(normalize_type_name("varchar(255)"), "TEXT");
        assert_eq!(normalize_type_name("boolean"), "INTEGER");
        assert_eq!(normalize_type_name("DECIMAL(10,2)"), "NUMERIC");
        assert_eq!(normalize_type_name("jsonb"), "JSON");
    }

    #[test]
    fn test_column_names_start_with_id() {
        let mut schema = TableSchema::new("entry", TableKind::Entity, PrimaryKey::Natural);
        schema.columns.push(Column::new("title", SqlType::Text));
        schema.columns.push(Column::foreign_key("struct_id", "struct"));

        assert_eq!(schema.column_names(), vec!["id", "title", "struct_id"]);
        assert_eq!(schema.foreign_keys().count(), 1);
    }
}
