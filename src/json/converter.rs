//! JSON to SQL Converter
//!
//! Coerces JSON values into cells of a declared column type and builds the
//! parameterized statements used for staging.

use super::flatten::FieldValue;
use crate::core::{normalize_type_name, CellValue, PrimaryKey, SqlType, TableSchema};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// A single value that could not be coerced. Never fatal: the cell is
/// stored as NULL.
#[derive(Debug, Error, PartialEq)]
#[error("cannot coerce {value} to {target}")]
pub struct CoercionError {
    pub value: String,
    pub target: SqlType,
}

/// Converts flattened JSON values to store cells
pub struct JsonToValueConverter;

impl JsonToValueConverter {
    pub fn convert(value: &FieldValue<'_>, target: SqlType) -> Result<CellValue, CoercionError> {
        match value {
            FieldValue::Scalar(v) => Self::convert_scalar(v, target),
            FieldValue::Json(text) => Self::convert_text(text, target),
        }
    }

    pub fn convert_scalar(value: &JsonValue, target: SqlType) -> Result<CellValue, CoercionError> {
        let fail = || CoercionError {
            value: value.to_string(),
            target,
        };

        match (value, target) {
            (JsonValue::Null, _) => Ok(CellValue::Null),

            // Booleans are stored as 0/1 whatever the column says
            (JsonValue::Bool(b), SqlType::Integer | SqlType::Real) => {
                Ok(CellValue::Integer(i64::from(*b)))
            }
            (JsonValue::Bool(b), t) if t.is_textual() => {
                Ok(CellValue::Text(i64::from(*b).to_string()))
            }
            (JsonValue::Bool(b), _) => Ok(CellValue::Blob(i64::from(*b).to_string().into_bytes())),

            (JsonValue::Number(n), SqlType::Integer) => {
                if let Some(i) = n.as_i64() {
                    Ok(CellValue::Integer(i))
                } else {
                    n.as_f64().and_then(truncate).map(CellValue::Integer).ok_or_else(fail)
                }
            }
            (JsonValue::Number(n), SqlType::Real) => {
                n.as_f64().map(CellValue::Real).ok_or_else(fail)
            }

            (JsonValue::String(s), SqlType::Integer) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().and_then(truncate))
                    .map(CellValue::Integer)
                    .ok_or_else(fail)
            }
            (JsonValue::String(s), SqlType::Real) => {
                s.trim().parse::<f64>().map(CellValue::Real).map_err(|_| fail())
            }

            (JsonValue::String(s), SqlType::Blob) => Ok(CellValue::Blob(s.as_bytes().to_vec())),
            (JsonValue::String(s), _) => Ok(CellValue::Text(s.clone())),

            (JsonValue::Number(n), SqlType::Blob) => {
                Ok(CellValue::Blob(n.to_string().into_bytes()))
            }
            (JsonValue::Number(n), _) => Ok(CellValue::Text(n.to_string())),

            // Nested values only reach here already serialized
            (JsonValue::Array(_) | JsonValue::Object(_), _) => {
                Self::convert_text(&value.to_string(), target)
            }
        }
    }

    fn convert_text(text: &str, target: SqlType) -> Result<CellValue, CoercionError> {
        match target {
            SqlType::Blob => Ok(CellValue::Blob(text.as_bytes().to_vec())),
            t if t.is_textual() => Ok(CellValue::Text(text.to_string())),
            _ => Err(CoercionError {
                value: text.to_string(),
                target,
            }),
        }
    }
}

fn truncate(f: f64) -> Option<i64> {
    if f.is_finite() && f.abs() < i64::MAX as f64 {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

pub fn quote_ident(ident: &str) -> String {
    let escaped = ident.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

/// Builder for CREATE TABLE IF NOT EXISTS statements
pub struct CreateTableBuilder {
    table_name: String,
    primary_key: PrimaryKey,
    columns: Vec<(String, String)>,
    unique: Option<Vec<String>>,
}

impl CreateTableBuilder {
    pub fn new(table_name: impl Into<String>, primary_key: PrimaryKey) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key,
            columns: Vec::new(),
            unique: None,
        }
    }

    /// Adds a plain column; the declared type is mapped onto the store vocabulary.
    pub fn add_column(mut self, name: impl Into<String>, data_type: &str) -> Self {
        self.columns
            .push((name.into(), normalize_type_name(data_type).to_string()));
        self
    }

    pub fn add_foreign_key(mut self, name: impl Into<String>, target: &str) -> Self {
        self.columns
            .push((name.into(), format!("INTEGER REFERENCES {}(id)", quote_ident(target))));
        self
    }

    pub fn unique(mut self, columns: Vec<String>) -> Self {
        self.unique = Some(columns);
        self
    }

    pub fn from_schema(schema: &TableSchema) -> Self {
        let mut builder = Self::new(schema.name.clone(), schema.primary_key);

        for column in &schema.columns {
            builder = match &column.references {
                Some(target) => builder.add_foreign_key(column.name.clone(), target),
                None => builder.add_column(column.name.clone(), column.sql_type.storage_type()),
            };
        }

        if schema.is_junction() {
            let pair = schema.columns.iter().map(|c| c.name.clone()).collect();
            builder = builder.unique(pair);
        }

        builder
    }

    pub fn build(self) -> String {
        let id_definition = match self.primary_key {
            PrimaryKey::Surrogate => "\"id\" INTEGER PRIMARY KEY AUTOINCREMENT",
            PrimaryKey::Natural => "\"id\" TEXT PRIMARY KEY",
        };

        let mut definitions = vec![id_definition.to_string()];
        definitions.extend(
            self.columns
                .iter()
                .map(|(name, definition)| format!("{} {}", quote_ident(name), definition)),
        );
        if let Some(unique) = &self.unique {
            let cols: Vec<String> = unique.iter().map(|c| quote_ident(c)).collect();
            definitions.push(format!("UNIQUE ({})", cols.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.table_name),
            definitions.join(", ")
        )
    }
}

/// Conflict resolution of an INSERT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnConflict {
    Abort,
    Replace,
    Ignore,
    /// Upsert on `id` that only fills columns still NULL in the stored row.
    Merge,
}

/// Builder for parameterized INSERT statements
pub struct InsertStatementBuilder {
    table_name: String,
    columns: Vec<String>,
    on_conflict: OnConflict,
}

impl InsertStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            on_conflict: OnConflict::Abort,
        }
    }

    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    pub fn build(self) -> String {
        let verb = match self.on_conflict {
            OnConflict::Abort | OnConflict::Merge => "INSERT",
            OnConflict::Replace => "INSERT OR REPLACE",
            OnConflict::Ignore => "INSERT OR IGNORE",
        };
        let cols: Vec<String> = self.columns.iter().map(|c| quote_ident(c)).collect();
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{}", i)).collect();

        let mut sql = format!(
            "{} INTO {} ({}) VALUES ({})",
            verb,
            quote_ident(&self.table_name),
            cols.join(", "),
            placeholders.join(", ")
        );
        if self.on_conflict == OnConflict::Merge {
            sql.push_str(&self.merge_clause());
        }
        sql
    }

    fn merge_clause(&self) -> String {
        let fills: Vec<String> = self
            .columns
            .iter()
            .filter(|c| c.as_str() != "id")
            .map(|c| {
                let col = quote_ident(c);
                format!("{} = COALESCE({}, excluded.{})", col, col, col)
            })
            .collect();

        if fills.is_empty() {
            " ON CONFLICT (\"id\") DO NOTHING".to_string()
        } else {
            format!(" ON CONFLICT (\"id\") DO UPDATE SET {}", fills.join(", "))
        }
    }
}

/// Builder for parameterized UPDATE ... WHERE id = ? statements
pub struct UpdateStatementBuilder {
    table_name: String,
    set_columns: Vec<String>,
}

impl UpdateStatementBuilder {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            set_columns: Vec::new(),
        }
    }

    pub fn set(mut self, column: impl Into<String>) -> Self {
        self.set_columns.push(column.into());
        self
    }

    /// Parameters are the SET values in order, then the row id.
    pub fn build(self) -> String {
        let set_parts: Vec<String> = self
            .set_columns
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{} = ?{}", quote_ident(col), i + 1))
            .collect();

        format!(
            "UPDATE {} SET {} WHERE \"id\" = ?{}",
            quote_ident(&self.table_name),
            set_parts.join(", "),
            self.set_columns.len() + 1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, TableKind};
    use serde_json::json;

    fn scalar(value: &JsonValue, target: SqlType) -> Result<CellValue, CoercionError> {
        JsonToValueConverter::convert_scalar(value, target)
    }

    #[test]
    fn test_integer_coercion() {
        assert_eq!(scalar(&json!(42), SqlType::Integer), Ok(CellValue::Integer(42)));
        assert_eq!(scalar(&json!(-3.9), SqlType::Integer), Ok(CellValue::Integer(-3)));
        assert_eq!(scalar(&json!(" 17 "), SqlType::Integer), Ok(CellValue::Integer(17)));
        assert_eq!(scalar(&json!("2.7"), SqlType::Integer), Ok(CellValue::Integer(2)));
        assert_eq!(scalar(&json!(true), SqlType::Integer), Ok(CellValue::Integer(1)));
        assert!(scalar(&json!("4HHB"), SqlType::Integer).is_err());
    }

    #[test]
    fn test_real_and_text_coercion() {
        assert_eq!(scalar(&json!(2), SqlType::Real), Ok(CellValue::Real(2.0)));
        assert_eq!(scalar(&json!("1.5"), SqlType::Real), Ok(CellValue::Real(1.5)));
        assert!(scalar(&json!("n/a"), SqlType::Real).is_err());
        assert_eq!(scalar(&json!(3.5), SqlType::Text), Ok(CellValue::Text("3.5".into())));
        assert_eq!(scalar(&json!(false), SqlType::Date), Ok(CellValue::Text("0".into())));
        assert_eq!(scalar(&json!("hello"), SqlType::Date), Ok(CellValue::Text("hello".into())));
        assert_eq!(scalar(&json!(null), SqlType::Integer), Ok(CellValue::Null));
    }

    #[test]
    fn test_blob_and_json_coercion() {
        assert_eq!(scalar(&json!("ab"), SqlType::Blob), Ok(CellValue::Blob(b"ab".to_vec())));
        let json_text = FieldValue::Json("[1,2]".to_string());
        assert_eq!(
            JsonToValueConverter::convert(&json_text, SqlType::Json),
            Ok(CellValue::Text("[1,2]".into()))
        );
        assert!(JsonToValueConverter::convert(&json_text, SqlType::Integer).is_err());
    }

    #[test]
    fn test_create_table_builder() {
        let mut schema = TableSchema::new("entry", TableKind::Entity, PrimaryKey::Natural);
        schema.columns.push(Column::new("struct_title", SqlType::Text));
        schema.columns.push(Column::new("released", SqlType::Date));
        schema.columns.push(Column::foreign_key("citation_id", "citation"));

        assert_eq!(
            CreateTableBuilder::from_schema(&schema).build(),
            "CREATE TABLE IF NOT EXISTS \"entry\" (\"id\" TEXT PRIMARY KEY, \
             \"struct_title\" TEXT, \"released\" TEXT, \
             \"citation_id\" INTEGER REFERENCES \"citation\"(id))"
        );
    }

    #[test]
    fn test_junction_table_is_unique_per_pair() {
        let mut schema = TableSchema::new(
            "a_b",
            TableKind::Junction { left: "a".into(), right: "b".into() },
            PrimaryKey::Surrogate,
        );
        schema.columns.push(Column::foreign_key("a_id", "a"));
        schema.columns.push(Column::foreign_key("b_id", "b"));

        let sql = CreateTableBuilder::from_schema(&schema).build();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS \"a_b\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT"));
        assert!(sql.ends_with("UNIQUE (\"a_id\", \"b_id\"))"));
    }

    #[test]
    fn test_insert_statement_builder() {
        let sql = InsertStatementBuilder::new("entry")
            .columns(vec!["id".to_string(), "title".to_string()])
            .on_conflict(OnConflict::Replace)
            .build();

        assert_eq!(sql, "INSERT OR REPLACE INTO \"entry\" (\"id\", \"title\") VALUES (?1, ?2)");
    }

    #[test]
    fn test_merge_only_fills_missing_columns() {
        let sql = InsertStatementBuilder::new("entry")
            .columns(vec!["id".to_string(), "title".to_string()])
            .on_conflict(OnConflict::Merge)
            .build();
        assert_eq!(
            sql,
            "INSERT INTO \"entry\" (\"id\", \"title\") VALUES (?1, ?2) \
             ON CONFLICT (\"id\") DO UPDATE SET \"title\" = COALESCE(\"title\", excluded.\"title\")"
        );

        let bare = InsertStatementBuilder::new("entry")
            .columns(vec!["id".to_string()])
            .on_conflict(OnConflict::Merge)
            .build();
        assert!(bare.ends_with("ON CONFLICT (\"id\") DO NOTHING"));
    }

    #[test]
    fn test_declared_types_are_normalized() {
        let sql = CreateTableBuilder::new("measure", PrimaryKey::Surrogate)
            .add_column("label", "varchar(40)")
            .add_column("amount", "decimal(10,2)")
            .add_column("payload", "jsonb")
            .build();
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS \"measure\" (\"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
             \"label\" TEXT, \"amount\" NUMERIC, \"payload\" JSON)"
        );
    }

    #[test]
    fn test_update_statement_builder() {
        let sql = UpdateStatementBuilder::new("entry").set("citation_id").build();
        assert_eq!(sql, "UPDATE \"entry\" SET \"citation_id\" = ?1 WHERE \"id\" = ?2");
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
