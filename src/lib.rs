//! sqlmig - ledger-backed SQL schema migrations.
//!
//! Applies ordered, dependent schema changes through a pluggable [`Executor`],
//! records every attempt in a [`Ledger`], and rolls back the most recent batch
//! on demand.
//!
//! ```text
//! generate ─▶ (author fills in SQL) ─▶ validate ─▶ resolve ─▶ engine::run
//!                                                                 │
//!                                         ledger ◀────────────────┘
//!                                            │
//!                                            ▼
//!                                   rollback_last_batch
//! ```
//!
//! # Example
//! ```no_run
//! use sqlmig::prelude::*;
//!
//! # async fn example() -> sqlmig::Result<()> {
//! let executor = std::sync::Arc::new(RecordingExecutor::new());
//! let migrator = Migrator::new(executor, MemoryLedger::new());
//!
//! let record = MigrationRecord::new(
//!     "7f9c2ba4-e88f-4d1e-9f3c-0d5e6b2a1c11",
//!     "create_events",
//!     "CREATE TABLE events (id uuid primary key)",
//! )
//! .rollback("DROP TABLE events");
//!
//! let report = migrator.migrate(&[record]).await?;
//! assert_eq!(report.applied.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod generate;
pub mod ledger;
pub mod lock;
pub mod logging;
pub mod managed;
pub mod migrator;
pub mod record;
pub mod resolve;
pub mod rollback;
pub mod status;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
pub use executor::{ExecutionError, Executor, Row};
pub use ledger::{Ledger, LedgerEntry, LedgerError};
pub use migrator::Migrator;
pub use record::MigrationRecord;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::engine::{Plan, RunFailure, RunReport};
    pub use crate::executor::{ExecutionError, Executor, RecordingExecutor, Row};
    pub use crate::generate::generate;
    pub use crate::ledger::{Ledger, LedgerEntry, MemoryLedger, SqlLedger};
    pub use crate::managed::{ChangeMeta, ManagedChange, managed};
    pub use crate::migrator::Migrator;
    pub use crate::record::MigrationRecord;
    pub use crate::resolve::{ResolverError, resolve};
    pub use crate::rollback::{RollbackError, RollbackReport};
    pub use crate::status::{StatusReport, VerifyReport};
    pub use crate::validate::{ValidationError, validate};
}
