//! Migration rollback operations

use anyhow::Result;
use colored::*;

use crate::config::Config;
use crate::lock::RunLock;

/// Undo the most recent batch, newest migration first.
pub async fn rollback(config: &Config) -> Result<()> {
    println!("{} {}", "Rolling back:".cyan().bold(), super::target(config).yellow());

    let store = super::store(config);
    store.init()?;
    let _lock = RunLock::acquire(store.dir())?;
    let current = store.load().unwrap_or_else(|e| {
        println!("  {} migration files not read ({}); using recorded directives only", "!".yellow(), e);
        Vec::new()
    });
    let migrator = super::connect(config).await?;

    let report = match migrator.rollback_with(&current).await {
        Ok(report) => report,
        Err(e) => {
            println!("  {} {}", "✗".red(), "rollback stopped".red().bold());
            return Err(e.into());
        }
    };

    match report.batch {
        None => println!("{}", "Nothing to roll back.".green()),
        Some(batch) if report.is_noop() => {
            println!("{} batch {} has no applied migrations", "!".yellow(), batch);
        }
        Some(batch) => {
            for id in &report.rolled_back {
                println!("  {} {}", "↩".yellow(), id);
            }
            println!();
            println!(
                "{} {} migration(s) rolled back from batch {}",
                "✓".green().bold(),
                report.rolled_back.len(),
                batch
            );
        }
    }
    Ok(())
}
