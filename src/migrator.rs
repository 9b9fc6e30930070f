//! The migration service: one explicitly constructed instance owning an
//! executor and a ledger, handed to whoever needs to migrate.

use tracing::warn;

use crate::engine::{self, Plan, RunReport};
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::ledger::Ledger;
use crate::record::MigrationRecord;
use crate::rollback::{self, RollbackReport};
use crate::status::{self, StatusReport, VerifyReport};
use crate::validate::validate_all;

pub struct Migrator<E, L> {
    executor: E,
    ledger: L,
}

impl<E: Executor, L: Ledger> Migrator<E, L> {
    pub fn new(executor: E, ledger: L) -> Self {
        Self { executor, ledger }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Create the ledger's backing structure if absent.
    pub async fn init(&self) -> Result<()> {
        self.ledger.ensure().await?;
        Ok(())
    }

    /// Validate `candidates` and compute what `migrate` would apply.
    pub async fn plan(&self, candidates: &[MigrationRecord]) -> Result<Plan> {
        check(candidates)?;
        Ok(engine::plan(candidates, &self.ledger).await?)
    }

    /// Validate `candidates` and apply the pending ones as a new batch.
    ///
    /// A failing migration is reported in [`RunReport::failure`], not as `Err`.
    pub async fn migrate(&self, candidates: &[MigrationRecord]) -> Result<RunReport> {
        check(candidates)?;
        Ok(engine::run(candidates, &self.ledger, &self.executor).await?)
    }

    pub async fn rollback(&self) -> Result<RollbackReport> {
        Ok(rollback::rollback_last_batch(&self.ledger, &self.executor).await?)
    }

    /// Roll back the latest batch; entries recorded without a rollback
    /// directive use the one in `current`.
    pub async fn rollback_with(&self, current: &[MigrationRecord]) -> Result<RollbackReport> {
        Ok(rollback::rollback_last_batch_with(&self.ledger, &self.executor, current).await?)
    }

    pub async fn status(&self) -> Result<StatusReport> {
        Ok(status::status(&self.ledger).await?)
    }

    pub async fn verify(&self, candidates: &[MigrationRecord]) -> Result<VerifyReport> {
        Ok(status::verify(candidates, &self.ledger).await?)
    }
}

fn check(candidates: &[MigrationRecord]) -> Result<()> {
    let report = validate_all(candidates);
    for (id, warning) in &report.warnings {
        warn!(id = %id, "{}", warning);
    }
    if !report.is_ok() {
        return Err(Error::Invalid(report.errors));
    }
    Ok(())
}
