use crate::core::{CellValue, Result, Row};
use crate::json::converter::quote_ident;
use crate::result::QueryResult;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// SQL executor trait - the seam between staging and the embedded store
pub trait SqlExecutor {
    /// Execute a statement, returning the number of changed rows
    fn execute(&self, sql: &str, params: &[CellValue]) -> Result<usize>;

    /// Execute several `;`-separated statements without parameters
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Run a statement and collect every row it returns
    fn query(&self, sql: &str, params: &[CellValue]) -> Result<QueryResult>;

    /// First row of a query, if any
    fn query_one(&self, sql: &str, params: &[CellValue]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.rows.into_iter().next())
    }

    /// Names of all user tables
    fn table_names(&self) -> Result<Vec<String>> {
        let result = self.query(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| row.get("name").and_then(|v| v.as_str()).map(String::from))
            .collect())
    }

    /// Number of rows in `table`
    fn row_count(&self, table: &str) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) AS n FROM {}", quote_ident(table));
        let count = self
            .query(&sql, &[])?
            .scalar("n")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        Ok(count as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub primary_key: bool,
}

/// Table description as reported by the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub row_count: usize,
}

/// One staged document: its own SQLite database addressed by an access id
pub struct Dataset {
    access_id: String,
    created_at: DateTime<Utc>,
    path: Option<PathBuf>,
    conn: Connection,
}

impl Dataset {
    /// Create a new in-memory dataset with a fresh access id
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::from_connection(new_access_id(), None, conn))
    }

    /// Create a new file-backed dataset at `<dir>/<access_id>.sqlite`
    pub fn create_in(dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let access_id = new_access_id();
        let path = dataset_path(dir.as_ref(), &access_id);
        let conn = Connection::open(&path)?;
        Ok(Self::from_connection(access_id, Some(path), conn))
    }

    fn from_connection(access_id: String, path: Option<PathBuf>, conn: Connection) -> Self {
        debug!(
            "Opened dataset {} ({})",
            access_id,
            path.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "in-memory".to_string())
        );
        Self {
            access_id,
            created_at: Utc::now(),
            path,
            conn,
        }
    }

    pub fn access_id(&self) -> &str {
        &self.access_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn begin(&self) -> Result<()> {
        self.execute_batch("BEGIN")
    }

    pub fn commit(&self) -> Result<()> {
        self.execute_batch("COMMIT")
    }

    pub fn rollback(&self) -> Result<()> {
        self.execute_batch("ROLLBACK")
    }

    /// Columns of `table` as reported by `PRAGMA table_info`
    pub fn table_info(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let sql = format!("PRAGMA table_info({})", quote_ident(table));
        let result = self.query(&sql, &[])?;

        Ok(result
            .rows
            .iter()
            .map(|row| ColumnInfo {
                name: row.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                data_type: row.get("type").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                primary_key: row.get("pk").and_then(|v| v.as_i64()).unwrap_or(0) > 0,
            })
            .collect())
    }

    /// Every user table with its columns and row count
    pub fn describe(&self) -> Result<Vec<TableInfo>> {
        self.table_names()?
            .into_iter()
            .map(|name| {
                Ok(TableInfo {
                    columns: self.table_info(&name)?,
                    row_count: self.row_count(&name)?,
                    name,
                })
            })
            .collect()
    }

    /// Drops every view and table of the dataset
    pub fn delete_all(&self) -> Result<()> {
        let objects = self.query(
            "SELECT type, name FROM sqlite_master WHERE type IN ('view', 'table') \
             AND name NOT LIKE 'sqlite_%' ORDER BY type DESC",
            &[],
        )?;

        for row in &objects.rows {
            let kind = row.get("type").and_then(|v| v.as_str()).unwrap_or_default();
            let Some(name) = row.get("name").and_then(|v| v.as_str()) else {
                continue;
            };
            let sql = match kind {
                "view" => format!("DROP VIEW IF EXISTS {}", quote_ident(name)),
                _ => format!("DROP TABLE IF EXISTS {}", quote_ident(name)),
            };
            self.execute_batch(&sql)?;
        }

        info!("Dataset {}: dropped {} objects", self.access_id, objects.row_count());
        Ok(())
    }
}

impl SqlExecutor for Dataset {
    fn execute(&self, sql: &str, params: &[CellValue]) -> Result<usize> {
        Ok(self.conn.execute(sql, params_from_iter(params.iter()))?)
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn query(&self, sql: &str, params: &[CellValue]) -> Result<QueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        // Statements without result columns (CREATE TEMP ..., DROP VIEW ...)
        // run to completion on the first step.
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let cell = CellValue::from(row.get_ref(i)?);
                record.insert(column.clone(), cell.to_json());
            }
            out.push(record);
        }

        Ok(QueryResult::new(columns, out))
    }
}

fn new_access_id() -> String {
    Uuid::new_v4().to_string()
}

pub(crate) fn dataset_path(dir: &Path, access_id: &str) -> PathBuf {
    dir.join(format!("{}.sqlite", access_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_execute_and_query() {
        let ds = Dataset::open_in_memory().unwrap();
        ds.execute_batch("CREATE TABLE entry (id TEXT PRIMARY KEY, weight REAL)").unwrap();
        let changed = ds
            .execute(
                "INSERT INTO entry (id, weight) VALUES (?1, ?2)",
                &[CellValue::Text("4HHB".into()), CellValue::Real(64.5)],
            )
            .unwrap();
        assert_eq!(changed, 1);

        let result = ds.query("SELECT id, weight FROM entry", &[]).unwrap();
        assert_eq!(result.columns, vec!["id", "weight"]);
        assert_eq!(result.rows[0]["id"], json!("4HHB"));
        assert_eq!(result.rows[0]["weight"], json!(64.5));
        assert_eq!(ds.row_count("entry").unwrap(), 1);
    }

    #[test]
    fn test_table_names_and_describe() {
        let ds = Dataset::open_in_memory().unwrap();
        ds.execute_batch(
            "CREATE TABLE b (id INTEGER PRIMARY KEY AUTOINCREMENT, x TEXT);
             CREATE TABLE a (id TEXT PRIMARY KEY);
             INSERT INTO b (x) VALUES ('one');",
        )
        .unwrap();

        assert_eq!(ds.table_names().unwrap(), vec!["a", "b"]);

        let tables = ds.describe().unwrap();
        assert_eq!(tables[1].name, "b");
        assert_eq!(tables[1].row_count, 1);
        assert_eq!(tables[1].columns[0].name, "id");
        assert!(tables[1].columns[0].primary_key);
        assert_eq!(tables[1].columns[1].data_type, "TEXT");
    }

    #[test]
    fn test_delete_all() {
        let ds = Dataset::open_in_memory().unwrap();
        ds.execute_batch(
            "CREATE TABLE a (id INTEGER PRIMARY KEY AUTOINCREMENT);
             CREATE VIEW v AS SELECT * FROM a;",
        )
        .unwrap();

        ds.delete_all().unwrap();
        assert!(ds.table_names().unwrap().is_empty());
        assert!(ds.query("SELECT * FROM v", &[]).is_err());
    }

    #[test]
    fn test_query_one_and_missing_table() {
        let ds = Dataset::open_in_memory().unwrap();
        assert_eq!(ds.query_one("SELECT 1 AS n WHERE 0", &[]).unwrap(), None);
        let err = ds.query("SELECT * FROM nope", &[]).unwrap_err();
        assert!(err.to_string().contains("no such table"));
    }
}
