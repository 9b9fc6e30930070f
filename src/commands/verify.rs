//! Migration file verification

use anyhow::{Result, bail};
use colored::*;

use crate::config::Config;

/// Check the migrations directory against the ledger. Fails unless clean.
pub async fn verify(config: &Config) -> Result<()> {
    println!("{}", "🔍 Verifying migrations".cyan().bold());
    println!();

    let candidates = super::store(config).load()?;
    let migrator = super::connect(config).await?;
    let report = migrator.verify(&candidates).await?;

    for error in &report.invalid {
        println!("  {} {}", "✗".red(), error);
    }
    if let Some(error) = &report.resolver {
        println!("  {} {}", "✗".red(), error);
    }
    for mismatch in &report.checksum_mismatches {
        println!(
            "  {} '{}' ({}) changed after it was applied: {} -> {}",
            "✗".red(),
            mismatch.name,
            mismatch.id,
            short(&mismatch.applied),
            short(&mismatch.current)
        );
    }
    for id in &report.orphaned {
        println!("  {} {} is applied but has no migration file", "!".yellow(), id);
    }
    for (id, warning) in &report.warnings {
        println!("  {} {}: {}", "!".yellow(), id, warning);
    }

    println!();
    println!(
        "  {} migration file(s), {} pending",
        candidates.len(),
        report.pending
    );

    if !report.is_clean() {
        bail!("verification failed");
    }
    println!("  {}", "✓ All migrations verified".green().bold());
    Ok(())
}

/// First twelve characters of a checksum. Stored values are not trusted to be ASCII.
fn short(checksum: &str) -> String {
    checksum.chars().take(12).collect()
}
