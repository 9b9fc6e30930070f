//! Rollback of the most recent batch.
//!
//! Successful entries of `max(batch)` are undone newest first, so dependents
//! are unwound before their dependencies. Each entry is deleted only after its
//! rollback directive ran; the first failure stops the walk and leaves the
//! remaining entries in place.
//!
//! The directive recorded with the entry wins. An entry recorded without one
//! falls back to the directive of the current record with the same id, if the
//! caller supplies it.

use tracing::{info, warn};

use crate::executor::Executor;
use crate::ledger::{self, Ledger, LedgerEntry, LedgerError};
use crate::record::MigrationRecord;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// `None` when the ledger was empty.
    pub batch: Option<i64>,
    /// Ids rolled back, in execution order.
    pub rolled_back: Vec<String>,
}

impl RollbackReport {
    pub fn is_noop(&self) -> bool {
        self.rolled_back.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error(
        "migration '{name}' ({id}) in batch {batch} could not be rolled back: {message}; \
         the batch is partially rolled back and needs manual intervention"
    )]
    Failed {
        batch: i64,
        id: String,
        name: String,
        message: String,
        rolled_back: Vec<String>,
    },

    #[error(
        "migration '{name}' ({id}) in batch {batch} has no rollback directive; \
         add `rollback` to its migration file and run rollback again, \
         or reverse it by hand and delete its ledger entry"
    )]
    MissingDirective {
        batch: i64,
        id: String,
        name: String,
        rolled_back: Vec<String>,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl RollbackError {
    /// Id of the migration the rollback stopped at, if any.
    pub fn stuck_at(&self) -> Option<&str> {
        match self {
            RollbackError::Failed { id, .. } | RollbackError::MissingDirective { id, .. } => Some(id),
            RollbackError::Ledger(_) => None,
        }
    }
}

/// Undo every successful migration of the highest batch in the ledger.
pub async fn rollback_last_batch<L, E>(ledger: &L, executor: &E) -> Result<RollbackReport, RollbackError>
where
    L: Ledger + ?Sized,
    E: Executor + ?Sized,
{
    rollback_last_batch_with(ledger, executor, &[]).await
}

/// Like [`rollback_last_batch`], taking directives missing from the ledger
/// from `current`.
pub async fn rollback_last_batch_with<L, E>(
    ledger: &L,
    executor: &E,
    current: &[MigrationRecord],
) -> Result<RollbackReport, RollbackError>
where
    L: Ledger + ?Sized,
    E: Executor + ?Sized,
{
    ledger.ensure().await?;
    let entries = ledger.entries().await?;

    let Some(batch) = ledger::latest_batch(&entries) else {
        info!("ledger is empty, nothing to roll back");
        return Ok(RollbackReport::default());
    };

    let targets = batch_to_unwind(entries, batch);
    if targets.is_empty() {
        warn!(batch, "latest batch has no applied migrations");
    }

    let mut report = RollbackReport {
        batch: Some(batch),
        rolled_back: Vec::new(),
    };

    for entry in targets {
        let Some(directive) = entry.rollback.as_deref().or_else(|| current_directive(current, &entry)) else {
            warn!(id = %entry.id, batch, "no rollback directive");
            return Err(RollbackError::MissingDirective {
                batch,
                id: entry.id,
                name: entry.name,
                rolled_back: report.rolled_back,
            });
        };

        if let Err(err) = executor.execute(directive).await {
            warn!(id = %entry.id, batch, error = %err, "rollback failed");
            return Err(RollbackError::Failed {
                batch,
                id: entry.id,
                name: entry.name,
                message: err.to_string(),
                rolled_back: report.rolled_back,
            });
        }

        ledger.delete(entry.attempt).await?;
        info!(id = %entry.id, name = %entry.name, batch, "rolled back");
        report.rolled_back.push(entry.id);
    }

    Ok(report)
}

fn current_directive<'a>(current: &'a [MigrationRecord], entry: &LedgerEntry) -> Option<&'a str> {
    let directive = current
        .iter()
        .find(|record| record.id == entry.id)?
        .rollback_directive()?;
    warn!(id = %entry.id, "no recorded rollback directive, using the current migration file");
    Some(directive)
}

/// Successful entries of `batch`, newest first.
fn batch_to_unwind(entries: Vec<LedgerEntry>, batch: i64) -> Vec<LedgerEntry> {
    let mut targets: Vec<LedgerEntry> = entries
        .into_iter()
        .filter(|e| e.batch == batch && e.success)
        .collect();
    targets.sort_by(|a, b| {
        b.executed_at
            .cmp(&a.executed_at)
            .then(b.attempt.cmp(&a.attempt))
    });
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;
    use crate::executor::RecordingExecutor;
    use crate::ledger::{FailingLedger, MemoryLedger, NewEntry};
    use crate::record::MigrationRecord;
    use pretty_assertions::assert_eq;

    fn m(id: &str, deps: &[&str]) -> MigrationRecord {
        let mut record = MigrationRecord::new(id, id, format!("CREATE TABLE {} (id int)", id))
            .rollback(format!("DROP TABLE {}", id));
        record.dependencies = deps.iter().map(|d| d.to_string()).collect();
        record
    }

    fn drops(executor: &RecordingExecutor) -> Vec<String> {
        executor
            .statements()
            .into_iter()
            .filter(|s| s.starts_with("DROP"))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_ledger_is_noop() {
        let report = rollback_last_batch(&MemoryLedger::new(), &RecordingExecutor::new())
            .await
            .unwrap();
        assert_eq!(report, RollbackReport::default());
    }

    #[tokio::test]
    async fn test_only_latest_batch_is_unwound() {
        let ledger = MemoryLedger::new();
        let executor = RecordingExecutor::new();
        engine::run(&[m("a", &[])], &ledger, &executor).await.unwrap();
        engine::run(&[m("a", &[]), m("b", &["a"])], &ledger, &executor).await.unwrap();

        let report = rollback_last_batch(&ledger, &executor).await.unwrap();
        assert_eq!(report.batch, Some(2));
        assert_eq!(report.rolled_back, vec!["b"]);

        let remaining: Vec<String> = ledger.entries().await.unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(remaining, vec!["a"]);
    }

    #[tokio::test]
    async fn test_failed_entries_stay_as_history() {
        let ledger = MemoryLedger::new();
        let executor = RecordingExecutor::new().fail_on("CREATE TABLE b", "duplicate table");
        engine::run(&[m("a", &[]), m("b", &[])], &ledger, &executor).await.unwrap();

        let report = rollback_last_batch(&ledger, &executor).await.unwrap();
        assert_eq!(report.rolled_back, vec!["a"]);
        assert_eq!(drops(&executor), vec!["DROP TABLE a"]);

        let entries = ledger.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].success);
    }

    #[tokio::test]
    async fn test_missing_directive_stops() {
        let record = MigrationRecord::new("a", "a", "CREATE TABLE a (id int)");
        let ledger = MemoryLedger::new();
        ledger.insert(NewEntry::success(&record, 1)).await.unwrap();
        let executor = RecordingExecutor::new();

        let err = rollback_last_batch(&ledger, &executor).await.unwrap_err();
        assert_eq!(err.stuck_at(), Some("a"));
        assert!(matches!(err, RollbackError::MissingDirective { .. }));
        assert!(executor.statements().is_empty());
        assert_eq!(ledger.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_ledger_delete_failure_is_fatal() {
        let memory = MemoryLedger::new();
        let executor = RecordingExecutor::new();
        engine::run(&[m("a", &[]), m("b", &["a"])], &memory, &executor).await.unwrap();

        let ledger = FailingLedger::new(memory).fail_deletes();
        let err = rollback_last_batch(&ledger, &executor).await.unwrap_err();

        assert!(matches!(err, RollbackError::Ledger(LedgerError::Storage(_))));
        assert_eq!(err.stuck_at(), None);
        assert_eq!(drops(&executor), vec!["DROP TABLE b"]);
        assert_eq!(ledger.inner().entries().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_directive_added_after_apply_is_used() {
        let applied = MigrationRecord::new("a", "a", "CREATE TABLE a (id int)");
        let ledger = MemoryLedger::new();
        ledger.insert(NewEntry::success(&applied, 1)).await.unwrap();
        let executor = RecordingExecutor::new();

        let err = rollback_last_batch(&ledger, &executor).await.unwrap_err();
        assert!(err.to_string().contains("add `rollback` to its migration file"));

        let edited = applied.clone().rollback("DROP TABLE a");
        let unrelated = m("b", &[]);
        let report = rollback_last_batch_with(&ledger, &executor, &[unrelated, edited])
            .await
            .unwrap();
        assert_eq!(report.rolled_back, vec!["a"]);
        assert_eq!(executor.statements(), vec!["DROP TABLE a"]);
        assert!(ledger.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_recorded_directive_wins_over_current_file() {
        let ledger = MemoryLedger::new();
        let executor = RecordingExecutor::new();
        engine::run(&[m("a", &[])], &ledger, &executor).await.unwrap();

        let edited = m("a", &[]).rollback("DROP TABLE a CASCADE");
        rollback_last_batch_with(&ledger, &executor, &[edited]).await.unwrap();
        assert_eq!(drops(&executor), vec!["DROP TABLE a"]);
    }

    #[test]
    fn test_unwind_order_breaks_timestamp_ties_by_attempt() {
        let at = chrono::Utc::now();
        let entries: Vec<LedgerEntry> = ["a", "b", "c"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let mut new = NewEntry::success(&m(id, &[]), 1);
                new.executed_at = at;
                new.into_entry(i as i64 + 1)
            })
            .collect();

        let order: Vec<String> = batch_to_unwind(entries, 1).into_iter().map(|e| e.id).collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }
}
