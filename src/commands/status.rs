//! Ledger status display

use anyhow::Result;
use colored::*;

use crate::config::Config;

pub async fn status(config: &Config) -> Result<()> {
    println!("{}", "📋 Migration Status".cyan().bold());
    println!();

    let migrator = super::connect(config).await?;
    let report = migrator.status().await?;

    println!("  Target:  {}", super::target(config).yellow());
    println!("  Ledger:  {}", migrator.ledger().table());
    println!();

    if report.entries.is_empty() {
        println!("  {}", "No migrations applied yet.".dimmed());
        return Ok(());
    }

    println!(
        "  {:<6} {:<36}  {:<28} {:<20} {}",
        "Batch", "Id", "Name", "Executed", "Result"
    );
    println!("  {}", "─".repeat(100).dimmed());
    for entry in &report.entries {
        let result = if entry.success {
            "ok".green()
        } else {
            "failed".red()
        };
        println!(
            "  {:<6} {:<36}  {:<28} {:<20} {}",
            entry.batch,
            entry.id,
            entry.name,
            entry.executed_at.format("%Y-%m-%d %H:%M:%S"),
            result
        );
        if let Some(message) = &entry.error_message {
            println!("  {:<6} {}", "", message.red().dimmed());
        }
    }

    println!();
    println!(
        "  {} total, {} succeeded, {} failed, latest batch {}",
        report.total,
        report.success_count.to_string().green(),
        report.failed_count.to_string().red(),
        report
            .latest_batch
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    Ok(())
}
