//! Execution diagnostics
//!
//! Store errors only carry a message; classify it and attach a hint the
//! caller can act on.

use crate::core::{SqlErrorKind, SqlExecutionError, StageError};

pub fn classify_message(message: &str) -> SqlErrorKind {
    let lower = message.to_lowercase();
    if lower.contains("no such table") {
        SqlErrorKind::NoSuchTable
    } else if lower.contains("no such column") {
        SqlErrorKind::NoSuchColumn
    } else if lower.contains("syntax error") || lower.contains("incomplete input") {
        SqlErrorKind::Syntax
    } else {
        SqlErrorKind::Other
    }
}

pub fn hint_for(kind: SqlErrorKind, available_tables: &[String]) -> String {
    match kind {
        SqlErrorKind::NoSuchTable if available_tables.is_empty() => {
            "This dataset has no tables".to_string()
        }
        SqlErrorKind::NoSuchTable => {
            format!("Available tables: {}", available_tables.join(", "))
        }
        SqlErrorKind::NoSuchColumn => {
            "List the columns of a table with PRAGMA table_info(<table>)".to_string()
        }
        SqlErrorKind::Syntax => "Check the statement near the reported token".to_string(),
        SqlErrorKind::Other => "Check the statement against the dataset schema".to_string(),
    }
}

/// Turns a storage failure of a user statement into an `SqlExecution` error.
/// Other errors pass through unchanged.
pub fn diagnose(err: StageError, available_tables: &[String]) -> StageError {
    match err {
        StageError::Storage(message) => {
            let kind = classify_message(&message);
            StageError::SqlExecution(SqlExecutionError {
                kind,
                hint: hint_for(kind, available_tables),
                message,
            })
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_message() {
        assert_eq!(classify_message("no such table: foo"), SqlErrorKind::NoSuchTable);
        assert_eq!(classify_message("no such column: bar"), SqlErrorKind::NoSuchColumn);
        assert_eq!(classify_message("near \"SELEC\": syntax error"), SqlErrorKind::Syntax);
        assert_eq!(classify_message("database is locked"), SqlErrorKind::Other);
    }

    #[test]
    fn test_missing_table_hint_lists_tables() {
        let tables = vec!["entry".to_string(), "citation".to_string()];
        let err = diagnose(StageError::Storage("no such table: entri".into()), &tables);

        match err {
            StageError::SqlExecution(e) => {
                assert_eq!(e.kind, SqlErrorKind::NoSuchTable);
                assert_eq!(e.hint, "Available tables: entry, citation");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = diagnose(StageError::Validation("x".into()), &[]);
        assert!(matches!(err, StageError::Validation(_)));
    }
}
