//! Ledger stored as a table in the target database, reached through the
//! same [`Executor`] the migrations run on.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{Ledger, LedgerEntry, LedgerError, NewEntry};
use crate::executor::{Executor, Row};

pub const DEFAULT_TABLE: &str = "_sqlmig_ledger";

const COLUMNS: &str = "attempt, id, name, description, batch, executed_at, dependencies, \
                       success, error_message, checksum, rollback";

pub struct SqlLedger<E> {
    executor: E,
    table: String,
}

impl<E: Executor> SqlLedger<E> {
    pub fn new(executor: E, table: impl Into<String>) -> Result<Self, LedgerError> {
        let table = table.into();
        if !is_identifier(&table) {
            return Err(LedgerError::InvalidTable(table));
        }
        Ok(Self { executor, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n\
             \x20   attempt bigserial primary key,\n\
             \x20   id text not null,\n\
             \x20   name text not null,\n\
             \x20   description text not null default '',\n\
             \x20   batch integer not null,\n\
             \x20   executed_at timestamptz not null default now(),\n\
             \x20   dependencies jsonb not null default '[]',\n\
             \x20   success boolean not null,\n\
             \x20   error_message text,\n\
             \x20   checksum text not null,\n\
             \x20   rollback text\n\
             );\n\
             CREATE INDEX IF NOT EXISTS {index} ON {table} (batch)",
            table = self.table,
            index = index_name(&self.table),
        )
    }

    fn exists_sql(&self) -> String {
        format!("SELECT to_regclass({}) IS NOT NULL AS present", quote(&self.table))
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT {COLUMNS} FROM {} ORDER BY batch, attempt",
            self.table
        )
    }

    fn insert_sql(&self, entry: &NewEntry) -> String {
        let dependencies = serde_json::to_string(&entry.dependencies).unwrap_or_else(|_| "[]".into());
        format!(
            "INSERT INTO {} (id, name, description, batch, executed_at, dependencies, success, \
             error_message, checksum, rollback) VALUES ({}, {}, {}, {}, {}::timestamptz, {}::jsonb, {}, {}, {}, {}) \
             RETURNING {COLUMNS}",
            self.table,
            quote(&entry.id),
            quote(&entry.name),
            quote(&entry.description),
            entry.batch,
            quote(&entry.executed_at.to_rfc3339()),
            quote(&dependencies),
            entry.success,
            quote_opt(entry.error_message.as_deref()),
            quote(&entry.checksum),
            quote_opt(entry.rollback.as_deref()),
        )
    }

    fn delete_sql(&self, attempt: i64) -> String {
        format!("DELETE FROM {} WHERE attempt = {}", self.table, attempt)
    }
}

#[async_trait]
impl<E: Executor> Ledger for SqlLedger<E> {
    async fn ensure(&self) -> Result<(), LedgerError> {
        let sql = self.create_sql();
        debug!(table = %self.table, "ensuring ledger table");
        self.executor.execute(&sql).await?;
        Ok(())
    }

    async fn exists(&self) -> Result<bool, LedgerError> {
        let rows = self.executor.execute(&self.exists_sql()).await?.unwrap_or_default();
        rows.first()
            .and_then(|row| row.get("present"))
            .and_then(Value::as_bool)
            .ok_or_else(|| LedgerError::Malformed(format!("existence check for {} returned no flag", self.table)))
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = self.executor.execute(&self.select_sql()).await?;
        rows.unwrap_or_default().into_iter().map(parse_row).collect()
    }

    async fn insert(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        let sql = self.insert_sql(&entry);
        debug!(id = %entry.id, batch = entry.batch, success = entry.success, "recording attempt");
        let rows = self.executor.execute(&sql).await?.unwrap_or_default();
        match rows.into_iter().next() {
            Some(row) => parse_row(row),
            None => Err(LedgerError::Malformed(format!(
                "insert into {} returned no row",
                self.table
            ))),
        }
    }

    async fn delete(&self, attempt: i64) -> Result<(), LedgerError> {
        debug!(attempt, "deleting ledger entry");
        self.executor.execute(&self.delete_sql(attempt)).await?;
        Ok(())
    }
}

fn parse_row(row: Row) -> Result<LedgerEntry, LedgerError> {
    serde_json::from_value(Value::Object(row)).map_err(|e| LedgerError::Malformed(e.to_string()))
}

/// Optionally schema-qualified identifier: `name` or `schema.name`.
fn is_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn index_name(table: &str) -> String {
    let bare = table.rsplit('.').next().unwrap_or(table);
    format!("{}_batch_idx", bare)
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn quote_opt(value: Option<&str>) -> String {
    value.map_or_else(|| "NULL".to_string(), quote)
}
