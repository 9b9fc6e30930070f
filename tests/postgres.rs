//! Runs against a live PostgreSQL when `SQLMIG_TEST_DATABASE_URL` is set;
//! otherwise every test returns early.

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::Value;
use sqlmig::executor::PgExecutor;
use sqlmig::prelude::*;

async fn connect() -> Option<PgExecutor> {
    let url = std::env::var("SQLMIG_TEST_DATABASE_URL").ok()?;
    Some(PgExecutor::connect(&url, 2, Duration::from_secs(10)).await.unwrap())
}

fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_void_result_does_not_fail_the_statement() {
    let Some(executor) = connect().await else {
        eprintln!("SQLMIG_TEST_DATABASE_URL not set, skipping");
        return;
    };
    let table = unique("sqlmig_void");

    let rows = executor
        .execute(&format!("SELECT pg_advisory_xact_lock(1); CREATE TABLE {} (id int)", table))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(rows[0].get("pg_advisory_xact_lock"), Some(&Value::Null));

    let exists = executor
        .execute(&format!("SELECT to_regclass('{}') IS NOT NULL AS present", table))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exists[0].get("present"), Some(&Value::Bool(true)));

    executor.execute(&format!("DROP TABLE {}", table)).await.unwrap();
}

#[tokio::test]
async fn test_uncommon_types_decode_as_text() {
    let Some(executor) = connect().await else {
        return;
    };

    let rows = executor
        .execute(
            "SELECT 12.50::numeric AS amount, DATE '2026-10-17' AS day, \
             '\\x01ff'::bytea AS raw, ARRAY[1, 2]::int4[] AS ids, 7::oid AS oid, NULL::int AS missing",
        )
        .await
        .unwrap()
        .unwrap();

    let row = &rows[0];
    assert_eq!(row["amount"], Value::from("12.50"));
    assert_eq!(row["day"], Value::from("2026-10-17"));
    assert_eq!(row["raw"], Value::from("\\x01ff"));
    assert_eq!(row["ids"], Value::from("{1,2}"));
    assert_eq!(row["oid"], Value::from("7"));
    assert_eq!(row["missing"], Value::Null);
}

#[tokio::test]
async fn test_migration_with_void_select_is_recorded_as_applied() {
    let Some(executor) = connect().await else {
        return;
    };
    let executor = Arc::new(executor);
    let ledger_table = unique("sqlmig_ledger");
    let table = unique("sqlmig_locked");
    let migrator = Migrator::new(executor.clone(), SqlLedger::new(executor.clone(), ledger_table.clone()).unwrap());

    let record = MigrationRecord::new(
        "6a1d2c3b-4e5f-4a7b-8c9d-0e1f2a3b4c5d",
        "locked_create",
        format!("SELECT pg_advisory_xact_lock(42); CREATE TABLE {} (id int)", table),
    )
    .rollback(format!("DROP TABLE {}", table));

    let report = migrator.migrate(&[record.clone()]).await.unwrap();
    assert!(report.is_success(), "{:?}", report.failure);

    let status = migrator.status().await.unwrap();
    assert_eq!((status.total, status.success_count), (1, 1));
    assert!(migrator.migrate(&[record]).await.unwrap().is_noop());

    migrator.rollback().await.unwrap();
    executor.execute(&format!("DROP TABLE {}", ledger_table)).await.unwrap();
}
