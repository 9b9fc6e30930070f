//! The ledger: a durable record of every migration attempt and its outcome.
//!
//! Entries are append-only. A retried migration gets a fresh entry; the only
//! deletion is the rollback of a successful entry in the latest batch.

#[cfg(test)]
mod failing;
mod memory;
mod sql;

#[cfg(test)]
pub(crate) use failing::FailingLedger;

pub use memory::MemoryLedger;
pub use sql::{DEFAULT_TABLE, SqlLedger};

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::executor::ExecutionError;
use crate::record::MigrationRecord;

/// One migration attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Store-assigned, strictly increasing.
    pub attempt: i64,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub batch: i64,
    pub executed_at: DateTime<Utc>,
    /// Dependencies as declared when the attempt ran.
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub checksum: String,
    /// Rollback directive as declared when the attempt ran.
    pub rollback: Option<String>,
}

/// An attempt about to be recorded. The ledger assigns the `attempt` number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub id: String,
    pub name: String,
    pub description: String,
    pub batch: i64,
    pub executed_at: DateTime<Utc>,
    pub dependencies: Vec<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub checksum: String,
    pub rollback: Option<String>,
}

impl NewEntry {
    pub fn success(record: &MigrationRecord, batch: i64) -> Self {
        Self::attempt(record, batch, None)
    }

    pub fn failure(record: &MigrationRecord, batch: i64, message: impl Into<String>) -> Self {
        Self::attempt(record, batch, Some(message.into()))
    }

    fn attempt(record: &MigrationRecord, batch: i64, error_message: Option<String>) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            batch,
            executed_at: Utc::now(),
            dependencies: record.dependencies.clone(),
            success: error_message.is_none(),
            error_message,
            checksum: record.checksum(),
            rollback: record.rollback_directive().map(str::to_string),
        }
    }

    pub(crate) fn into_entry(self, attempt: i64) -> LedgerEntry {
        LedgerEntry {
            attempt,
            id: self.id,
            name: self.name,
            description: self.description,
            batch: self.batch,
            executed_at: self.executed_at,
            dependencies: self.dependencies,
            success: self.success,
            error_message: self.error_message,
            checksum: self.checksum,
            rollback: self.rollback,
        }
    }
}

/// The ledger could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger storage unavailable: {0}")]
    Storage(#[from] ExecutionError),

    #[error("malformed ledger row: {0}")]
    Malformed(String),

    #[error("invalid ledger table name '{0}'")]
    InvalidTable(String),
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Create the backing structure if it does not exist. Idempotent.
    async fn ensure(&self) -> Result<(), LedgerError>;

    /// Whether the backing structure exists. Read-only.
    async fn exists(&self) -> Result<bool, LedgerError> {
        Ok(true)
    }

    /// All entries, ordered by batch then attempt.
    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError>;

    async fn insert(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError>;

    async fn delete(&self, attempt: i64) -> Result<(), LedgerError>;

    /// Ids with at least one successful entry.
    async fn applied_ids(&self) -> Result<HashSet<String>, LedgerError> {
        Ok(applied_ids(&self.entries().await?))
    }
}

#[async_trait]
impl<T: Ledger + ?Sized> Ledger for std::sync::Arc<T> {
    async fn ensure(&self) -> Result<(), LedgerError> {
        (**self).ensure().await
    }

    async fn exists(&self) -> Result<bool, LedgerError> {
        (**self).exists().await
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        (**self).entries().await
    }

    async fn insert(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        (**self).insert(entry).await
    }

    async fn delete(&self, attempt: i64) -> Result<(), LedgerError> {
        (**self).delete(attempt).await
    }
}

pub fn applied_ids(entries: &[LedgerEntry]) -> HashSet<String> {
    entries
        .iter()
        .filter(|e| e.success)
        .map(|e| e.id.clone())
        .collect()
}

pub fn latest_batch(entries: &[LedgerEntry]) -> Option<i64> {
    entries.iter().map(|e| e.batch).max()
}

/// Batch number for a new run. Failed runs consume their number too.
pub fn next_batch(entries: &[LedgerEntry]) -> i64 {
    latest_batch(entries).map_or(1, |b| b + 1)
}
