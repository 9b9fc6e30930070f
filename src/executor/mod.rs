//! The SQL execution capability the engine is written against.
//!
//! An executor takes opaque SQL text and returns either the rows it produced
//! or a typed failure. The engine never opens connections or knows a dialect.

mod postgres;
mod recording;
mod rpc;

pub use postgres::PgExecutor;
pub use recording::RecordingExecutor;
pub use rpc::RpcExecutor;

use std::sync::Arc;

use async_trait::async_trait;

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Failure reported by an [`Executor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    /// The backing store rejected the statement.
    #[error("database error: {0}")]
    Database(String),

    /// The store could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// The RPC endpoint answered with a non-success status.
    #[error("endpoint rejected statement (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    /// The store answered, but the result could not be turned into rows.
    #[error("could not decode result: {0}")]
    Decode(String),
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `sql` and return its rows, or `None` when the statement produced none.
    async fn execute(&self, sql: &str) -> Result<Option<Vec<Row>>, ExecutionError>;
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for &T {
    async fn execute(&self, sql: &str) -> Result<Option<Vec<Row>>, ExecutionError> {
        (**self).execute(sql).await
    }
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for Arc<T> {
    async fn execute(&self, sql: &str) -> Result<Option<Vec<Row>>, ExecutionError> {
        (**self).execute(sql).await
    }
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for Box<T> {
    async fn execute(&self, sql: &str) -> Result<Option<Vec<Row>>, ExecutionError> {
        (**self).execute(sql).await
    }
}
