//! PostgreSQL executor over a `sqlx` connection pool.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use super::{ExecutionError, Executor, Row};

pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Connect a pool. `acquire_timeout` bounds how long one statement waits
    /// for a connection.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, ExecutionError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(ExecutionError::from)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Executor for PgExecutor {
    async fn execute(&self, sql: &str) -> Result<Option<Vec<Row>>, ExecutionError> {
        // Simple query protocol: migrations are usually several statements.
        let rows = sqlx::raw_sql(sql).fetch_all(&self.pool).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.iter().map(row_to_json).collect()))
    }
}

impl From<sqlx::Error> for ExecutionError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => ExecutionError::Database(db.message().to_string()),
            sqlx::Error::PoolTimedOut => ExecutionError::Timeout("waiting for a connection".into()),
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                ExecutionError::Transport(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                ExecutionError::Decode(err.to_string())
            }
            other => ExecutionError::Database(other.to_string()),
        }
    }
}

/// Rows are informational; the statement has already run by the time they are
/// decoded, so a column that cannot be decoded becomes `null` instead of an error.
fn row_to_json(row: &PgRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        let type_name = column.type_info().name();
        let value = decode_column(row, column.ordinal(), type_name).unwrap_or_else(|err| {
            debug!(column = column.name(), sql_type = type_name, error = %err, "undecodable column");
            Value::Null
        });
        out.insert(column.name().to_string(), value);
    }
    out
}

fn decode_column(row: &PgRow, idx: usize, type_name: &str) -> Result<Value, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(Value::Null);
    }
    let value = match type_name {
        "VOID" => Value::Null,
        "BOOL" => Value::Bool(row.try_get(idx)?),
        "INT2" => Value::from(row.try_get::<i16, _>(idx)?),
        "INT4" => Value::from(row.try_get::<i32, _>(idx)?),
        "INT8" => Value::from(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => Value::from(row.try_get::<f32, _>(idx)? as f64),
        "FLOAT8" => Value::from(row.try_get::<f64, _>(idx)?),
        "JSON" | "JSONB" => row.try_get::<Value, _>(idx)?,
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339()),
        "TIMESTAMP" => Value::String(row.try_get::<NaiveDateTime, _>(idx)?.to_string()),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(idx)?.to_string()),
        "TEXT[]" | "VARCHAR[]" => Value::from(row.try_get::<Vec<String>, _>(idx)?),
        // Simple query protocol returns text format, so anything else reads as
        // its Postgres text form (NUMERIC, DATE, BYTEA, INT4[], ...).
        _ => Value::String(row.try_get_unchecked::<String, _>(idx)?),
    };
    Ok(value)
}
