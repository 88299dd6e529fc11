/// Integration tests for the SQL gateway
///
/// Run with: cargo test --test gateway_tests

use serde_json::json;
use stagedb::{
    stage_document, Dataset, QueryType, SqlErrorKind, SqlExecutor, SqlGateway, StageError,
    StagingConfig,
};

fn staged() -> Dataset {
    let (dataset, _) = stage_document(&json!({
        "entries": [
            {"rcsb_id": "4HHB", "resolution": 1.74, "struct": {"title": "HEMOGLOBIN"}},
            {"rcsb_id": "1ABC", "resolution": 2.5, "struct": {"title": "LYSOZYME"}}
        ]
    }))
    .unwrap();
    dataset
}

#[test]
fn test_select_is_allowed() {
    let dataset = staged();
    let result = SqlGateway::new().execute(&dataset, "SELECT * FROM entry").unwrap();

    assert_eq!(result.query_type, QueryType::Select);
    assert_eq!(result.row_count, 2);
    assert_eq!(result.columns[0], "id");
    assert!(result.warnings.is_empty());
}

#[test]
fn test_rows_keep_column_order() {
    let dataset = staged();
    let result = SqlGateway::new()
        .execute(&dataset, "SELECT struct_title, id FROM entry ORDER BY resolution;")
        .unwrap();

    let keys: Vec<&String> = result.rows[0].keys().collect();
    assert_eq!(keys, vec!["struct_title", "id"]);
    assert_eq!(result.rows[0]["struct_title"], json!("HEMOGLOBIN"));
}

#[test]
fn test_cte_pragma_and_explain() {
    let dataset = staged();
    let gateway = SqlGateway::new();

    let cte = gateway
        .execute(&dataset, "WITH hi AS (SELECT id FROM entry WHERE resolution < 2) SELECT * FROM hi")
        .unwrap();
    assert_eq!(cte.query_type, QueryType::Cte);
    assert_eq!(cte.rows[0]["id"], json!("4HHB"));

    let pragma = gateway.execute(&dataset, "PRAGMA table_info(entry)").unwrap();
    assert_eq!(pragma.query_type, QueryType::Pragma);
    assert!(pragma.row_count >= 3);

    let explain = gateway.execute(&dataset, "EXPLAIN QUERY PLAN SELECT * FROM entry").unwrap();
    assert_eq!(explain.query_type, QueryType::Explain);
}

#[test]
fn test_delete_is_not_allowed() {
    let dataset = staged();
    let err = SqlGateway::new().execute(&dataset, "DELETE FROM entry").unwrap_err();

    assert!(matches!(err, StageError::QueryNotAllowed { .. }));
    assert!(err.to_string().contains("SELECT"));
    assert_eq!(dataset.row_count("entry").unwrap(), 2);
}

#[test]
fn test_temporary_tables_are_allowed() {
    let dataset = staged();
    let gateway = SqlGateway::new();

    let created = gateway
        .execute(&dataset, "CREATE TEMPORARY TABLE tmp AS SELECT 1 AS one")
        .unwrap();
    assert_eq!(created.query_type, QueryType::CreateTemp);
    assert_eq!(created.row_count, 0);

    let read = gateway.execute(&dataset, "SELECT one FROM tmp").unwrap();
    assert_eq!(read.rows[0]["one"], json!(1));

    gateway.execute(&dataset, "DROP TEMP TABLE tmp").unwrap();
}

#[test]
fn test_views_are_allowed() {
    let dataset = staged();
    let gateway = SqlGateway::new();

    gateway
        .execute(&dataset, "CREATE TEMP VIEW titles AS SELECT struct_title FROM entry")
        .unwrap();
    assert_eq!(gateway.execute(&dataset, "SELECT * FROM titles").unwrap().row_count, 2);
    gateway.execute(&dataset, "DROP VIEW titles").unwrap();
}

#[test]
fn test_table_ddl_is_rejected() {
    let dataset = staged();
    let gateway = SqlGateway::new();

    assert!(gateway.execute(&dataset, "DROP TABLE entry").is_err());
    assert!(gateway.execute(&dataset, "CREATE TABLE entry2(x)").is_err());
    assert!(matches!(
        gateway.execute(&dataset, "SELECT 1; DROP TABLE entry"),
        Err(StageError::ForbiddenStatement(_))
    ));
    assert_eq!(dataset.row_count("entry").unwrap(), 2);
}

#[test]
fn test_missing_table_hint_lists_tables() {
    let dataset = staged();
    let err = SqlGateway::new().execute(&dataset, "SELECT * FROM entries").unwrap_err();

    match err {
        StageError::SqlExecution(e) => {
            assert_eq!(e.kind, SqlErrorKind::NoSuchTable);
            assert!(e.hint.contains("entry"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_column_and_syntax_errors() {
    let dataset = staged();
    let gateway = SqlGateway::new();

    match gateway.execute(&dataset, "SELECT nope FROM entry") {
        Err(StageError::SqlExecution(e)) => assert_eq!(e.kind, SqlErrorKind::NoSuchColumn),
        other => panic!("unexpected result: {:?}", other.map(|r| r.row_count)),
    }
    match gateway.execute(&dataset, "SELECT FROM WHERE") {
        Err(StageError::SqlExecution(e)) => assert_eq!(e.kind, SqlErrorKind::Syntax),
        other => panic!("unexpected result: {:?}", other.map(|r| r.row_count)),
    }
}

#[test]
fn test_large_unbounded_select_gets_limit_hint() {
    let dataset = staged();
    let gateway = SqlGateway::with_config(&StagingConfig::new().large_result_hint_rows(1));

    let unbounded = gateway.execute(&dataset, "SELECT id FROM entry").unwrap();
    assert_eq!(unbounded.warnings.len(), 1);
    assert!(unbounded.warnings[0].contains("LIMIT"));

    let bounded = gateway.execute(&dataset, "SELECT id FROM entry LIMIT 5").unwrap();
    assert!(bounded.warnings.is_empty());
}

#[test]
fn test_dml_behind_with_prefix_leaves_tables_untouched() {
    let dataset = staged();
    let gateway = SqlGateway::new();

    for sql in [
        "WITH x AS (SELECT 1) UPDATE OR REPLACE entry SET struct_title = 'changed'",
        "WITH x AS (SELECT 1) UPDATE entry AS e SET struct_title = 'changed'",
        "WITH x AS (SELECT 1) DELETE FROM entry",
        "WITH x AS (SELECT 1) INSERT INTO [entry] (id) VALUES ('Z')",
        "WITH x AS (SELECT 1) INSERT INTO `entry` (id) VALUES ('Z')",
        "WITH x AS (SELECT 1) INSERT INTO \"entry\" (id) VALUES ('Z')",
        "WITH x AS (SELECT 1) REPLACE INTO entry (id) VALUES ('Y')",
    ] {
        assert!(
            matches!(gateway.execute(&dataset, sql), Err(StageError::ForbiddenStatement(_))),
            "{} should be forbidden",
            sql
        );
    }

    assert_eq!(dataset.row_count("entry").unwrap(), 2);
    let titles = gateway
        .execute(&dataset, "SELECT struct_title FROM entry ORDER BY id")
        .unwrap();
    assert_eq!(titles.rows[0]["struct_title"], json!("LYSOZYME"));
    assert_eq!(titles.rows[1]["struct_title"], json!("HEMOGLOBIN"));
}

#[test]
fn test_temporary_copy_of_staged_table() {
    let dataset = staged();
    let gateway = SqlGateway::new();

    gateway
        .execute(
            &dataset,
            "CREATE TEMPORARY TABLE fine AS SELECT id, resolution FROM entry WHERE resolution < 2",
        )
        .unwrap();
    gateway
        .execute(
            &dataset,
            "WITH coarse AS (SELECT id, resolution FROM entry WHERE resolution >= 2) \
             INSERT INTO temp.fine SELECT * FROM coarse",
        )
        .unwrap();

    let copied = gateway.execute(&dataset, "SELECT id FROM fine ORDER BY id").unwrap();
    assert_eq!(copied.row_count, 2);
    assert_eq!(copied.rows[0]["id"], json!("1ABC"));
    assert_eq!(dataset.row_count("entry").unwrap(), 2);
}
