//! CLI commands for sqlmig.
//!
//! One submodule per command, each a thin presentation layer over one
//! library operation:
//! - `init`: create the migrations directory, config file and ledger table
//! - `generate`: scaffold a new migration file
//! - `migrate`: apply pending migrations as a new batch
//! - `rollback`: undo the latest batch
//! - `status`: show the ledger
//! - `verify`: check migration files against the ledger

mod generate;
mod init;
mod migrate;
mod rollback;
mod status;
mod verify;

pub use generate::generate;
pub use init::init;
pub use migrate::migrate;
pub use rollback::rollback;
pub use status::status;
pub use verify::verify;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::{Config, ExecutorKind};
use crate::executor::{Executor, PgExecutor, RpcExecutor};
use crate::ledger::SqlLedger;
use crate::migrator::Migrator;
use crate::store::MigrationStore;

pub type CliExecutor = Arc<dyn Executor>;
pub type CliMigrator = Migrator<CliExecutor, SqlLedger<CliExecutor>>;

/// Build the configured executor and a ledger table on top of it.
pub async fn connect(config: &Config) -> Result<CliMigrator> {
    let executor: CliExecutor = match config.executor {
        ExecutorKind::Postgres => {
            let url = config.database_url()?;
            let executor = PgExecutor::connect(
                url,
                config.database.max_connections,
                config.acquire_timeout(),
            )
            .await
            .context("Failed to connect to the database")?;
            Arc::new(executor)
        }
        ExecutorKind::Rpc => {
            let executor = RpcExecutor::new(
                config.rpc_url()?,
                &config.rpc.function,
                config.rpc.api_key.clone(),
                config.rpc_timeout(),
            )
            .context("Failed to set up the RPC client")?;
            Arc::new(executor)
        }
    };

    let ledger = SqlLedger::new(executor.clone(), config.ledger_table.clone())?;
    Ok(Migrator::new(executor, ledger))
}

pub fn store(config: &Config) -> MigrationStore {
    MigrationStore::new(&config.migrations_dir)
}

/// Target shown in command headers, without credentials.
pub fn target(config: &Config) -> String {
    match config.executor {
        ExecutorKind::Postgres => config
            .database
            .url
            .as_deref()
            .map(redact_url)
            .unwrap_or_else(|| "<no database.url>".to_string()),
        ExecutorKind::Rpc => config
            .rpc
            .url
            .clone()
            .unwrap_or_else(|| "<no rpc.url>".to_string()),
    }
}

fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, host)) => {
            let user = credentials.split(':').next().unwrap_or_default();
            format!("{}://{}:***@{}", scheme, user, host)
        }
        None => url.to_string(),
    }
}
