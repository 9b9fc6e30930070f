//! Batch-scoped execution of pending migrations.
//!
//! One run gets one batch number. Migrations are applied strictly one after
//! another in resolved order; the first failure is recorded and ends the run.

use tracing::{debug, info, warn};

use crate::executor::Executor;
use crate::ledger::{self, Ledger, LedgerError, NewEntry};
use crate::record::MigrationRecord;
use crate::resolve::{ResolverError, check_graph, resolve};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Resolve(#[from] ResolverError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The migration that stopped a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    pub id: String,
    pub name: String,
    pub message: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// `None` when nothing was pending.
    pub batch: Option<i64>,
    /// Ids applied in this run, in order.
    pub applied: Vec<String>,
    pub failure: Option<RunFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn is_noop(&self) -> bool {
        self.batch.is_none()
    }
}

/// What a run would do, without doing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub batch: i64,
    pub pending: Vec<MigrationRecord>,
}

/// Compute the pending migrations and the batch they would run in.
pub async fn plan<L>(candidates: &[MigrationRecord], ledger: &L) -> Result<Plan, EngineError>
where
    L: Ledger + ?Sized,
{
    check_graph(candidates)?;
    ledger.ensure().await?;

    let entries = ledger.entries().await?;
    let applied = ledger::applied_ids(&entries);
    let pending = resolve(candidates, &applied)?
        .into_iter()
        .filter(|record| !applied.contains(&record.id))
        .collect();

    Ok(Plan {
        batch: ledger::next_batch(&entries),
        pending,
    })
}

/// Apply every pending migration in `candidates`.
///
/// Resolver errors abort before any storage access. Execution failures are
/// recorded in the ledger and reported in [`RunReport::failure`]; only
/// ledger access errors come back as `Err`.
pub async fn run<L, E>(
    candidates: &[MigrationRecord],
    ledger: &L,
    executor: &E,
) -> Result<RunReport, EngineError>
where
    L: Ledger + ?Sized,
    E: Executor + ?Sized,
{
    let Plan { batch, pending } = plan(candidates, ledger).await?;

    if pending.is_empty() {
        info!("no pending migrations");
        return Ok(RunReport::default());
    }

    info!(batch, count = pending.len(), "applying migrations");
    let mut report = RunReport {
        batch: Some(batch),
        ..RunReport::default()
    };

    for record in &pending {
        debug!(id = %record.id, name = %record.name, "executing migration");

        match executor.execute(&record.sql).await {
            Ok(_) => {
                ledger.insert(NewEntry::success(record, batch)).await?;
                info!(id = %record.id, name = %record.name, batch, "applied");
                report.applied.push(record.id.clone());
            }
            Err(err) => {
                let message = err.to_string();
                warn!(id = %record.id, name = %record.name, batch, error = %message, "migration failed");
                ledger.insert(NewEntry::failure(record, batch, message.clone())).await?;
                report.failure = Some(RunFailure {
                    id: record.id.clone(),
                    name: record.name.clone(),
                    message,
                });
                break;
            }
        }
    }

    Ok(report)
}
