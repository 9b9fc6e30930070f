//! Project initialization

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;

use crate::config::{CONFIG_FILE, Config, ExecutorKind};

/// Create the migrations directory and config file, then the ledger table.
pub async fn init(config: &Config, config_path: Option<&Path>) -> Result<()> {
    println!("{}", "🚀 Initializing sqlmig".cyan().bold());
    println!();

    let store = super::store(config);
    if store.init()? {
        println!("  {} {}", "✓ Created:".green(), store.dir().display());
    } else {
        println!("  {} {}", "○ Exists:".dimmed(), store.dir().display());
    }

    let path = config_path.unwrap_or(Path::new(CONFIG_FILE));
    if path.exists() {
        println!("  {} {}", "○ Exists:".dimmed(), path.display());
    } else {
        std::fs::write(path, config.to_toml()?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  {} {}", "✓ Created:".green(), path.display());
    }

    let configured = match config.executor {
        ExecutorKind::Postgres => config.database.url.is_some(),
        ExecutorKind::Rpc => config.rpc.url.is_some(),
    };
    if !configured {
        println!();
        println!(
            "  {} No database configured; set it in {} and run {} again.",
            "!".yellow(),
            path.display().to_string().yellow(),
            "sqlmig init".cyan()
        );
        return Ok(());
    }

    let migrator = super::connect(config).await?;
    migrator.init().await?;
    println!(
        "  {} ledger table {} on {}",
        "✓ Ready:".green(),
        migrator.ledger().table().cyan(),
        super::target(config).yellow()
    );

    println!();
    println!("  Next: {}", "sqlmig generate <name>".cyan());
    Ok(())
}
