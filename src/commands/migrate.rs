//! Migration forward operations

use std::collections::HashMap;

use anyhow::{Result, bail};
use colored::*;

use crate::config::Config;
use crate::lock::RunLock;

/// Apply every pending migration from the migrations directory as one batch.
pub async fn migrate(config: &Config, dry_run: bool) -> Result<()> {
    println!("{} {}", "Migrating:".cyan().bold(), super::target(config).yellow());

    let store = super::store(config);
    let candidates = store.load()?;
    let migrator = super::connect(config).await?;

    if dry_run {
        let plan = migrator.plan(&candidates).await?;
        if plan.pending.is_empty() {
            println!("{}", "No migrations to apply.".green());
            return Ok(());
        }
        println!(
            "{} {} migration(s) would run as batch {}",
            "Dry run:".yellow().bold(),
            plan.pending.len(),
            plan.batch
        );
        for (i, record) in plan.pending.iter().enumerate() {
            println!("  [{}/{}] {} {}", i + 1, plan.pending.len(), record.name.cyan(), record.id.dimmed());
        }
        return Ok(());
    }

    let _lock = RunLock::acquire(store.dir())?;
    let report = migrator.migrate(&candidates).await?;

    let Some(batch) = report.batch else {
        println!("{}", "No migrations to apply.".green());
        return Ok(());
    };

    let names: HashMap<&str, &str> = candidates
        .iter()
        .map(|r| (r.id.as_str(), r.name.as_str()))
        .collect();
    let total = report.applied.len() + usize::from(report.failure.is_some());

    println!("{} batch {}", "Applying:".cyan(), batch);
    for (i, id) in report.applied.iter().enumerate() {
        let name = names.get(id.as_str()).copied().unwrap_or_default();
        println!("  [{}/{}] {} {} {}", i + 1, total, "✓".green(), name, id.dimmed());
    }

    if let Some(failure) = report.failure {
        println!("  [{}/{}] {} {} {}", total, total, "✗".red(), failure.name, failure.id.dimmed());
        println!();
        bail!(
            "migration '{}' ({}) failed: {}; batch {} is incomplete, {} migration(s) applied before the failure",
            failure.name,
            failure.id,
            failure.message,
            batch,
            report.applied.len()
        );
    }

    println!();
    println!(
        "{} {} migration(s) applied in batch {}",
        "✓".green().bold(),
        report.applied.len(),
        batch
    );
    Ok(())
}
