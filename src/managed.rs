//! Managed changes: wrap a plain operation that produces SQL together with the
//! metadata needed to track it in the ledger.
//!
//! ```no_run
//! use sqlmig::prelude::*;
//!
//! # async fn example(migrator: &Migrator<RecordingExecutor, MemoryLedger>) -> sqlmig::Result<()> {
//! let create_sponsors = managed(
//!     ChangeMeta::new("5e2d7c90-8a41-4b3f-b6e2-91c0d4f7a835", "create_sponsors")
//!         .description("Sponsor directory")
//!         .rollback("DROP TABLE sponsors"),
//!     || "CREATE TABLE sponsors (id uuid primary key, name text not null)".to_string(),
//! );
//!
//! create_sponsors.apply(migrator).await?;
//! # Ok(())
//! # }
//! ```

use crate::engine::RunReport;
use crate::error::Result;
use crate::executor::Executor;
use crate::ledger::Ledger;
use crate::migrator::Migrator;
use crate::record::MigrationRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMeta {
    pub id: String,
    pub name: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub rollback: Option<String>,
}

impl ChangeMeta {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            dependencies: Vec::new(),
            rollback: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn rollback(mut self, sql: impl Into<String>) -> Self {
        self.rollback = Some(sql.into());
        self
    }
}

pub struct ManagedChange<F> {
    meta: ChangeMeta,
    op: F,
}

/// Pair an operation with its change metadata.
pub fn managed<F>(meta: ChangeMeta, op: F) -> ManagedChange<F>
where
    F: Fn() -> String,
{
    ManagedChange { meta, op }
}

impl<F> ManagedChange<F>
where
    F: Fn() -> String,
{
    pub fn meta(&self) -> &ChangeMeta {
        &self.meta
    }

    /// The record this change stands for. Invokes the operation.
    pub fn record(&self) -> MigrationRecord {
        MigrationRecord {
            id: self.meta.id.clone(),
            name: self.meta.name.clone(),
            description: self.meta.description.clone(),
            dependencies: self.meta.dependencies.clone(),
            created_at: None,
            sql: (self.op)(),
            rollback: self.meta.rollback.clone(),
        }
    }

    /// Run the change through `migrator` as its own batch. A no-op if it is
    /// already applied; its dependencies must already be applied.
    pub async fn apply<E, L>(&self, migrator: &Migrator<E, L>) -> Result<RunReport>
    where
        E: Executor,
        L: Ledger,
    {
        migrator.migrate(&[self.record()]).await
    }
}
