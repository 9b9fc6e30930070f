use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

use sqlmig::commands;
use sqlmig::config::Config;

#[derive(Parser, Debug)]
#[command(name = "sqlmig", version, about = "Dependency-aware SQL schema migrations")]
struct Cli {
    /// Path to the config file (default: ./sqlmig.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// PostgreSQL connection URL, overrides `database.url`
    #[arg(long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Directory holding migration files, overrides `migrations_dir`
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the migrations directory, config file and ledger table
    Init,
    /// Scaffold a new migration file
    Generate {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Comma-separated ids this migration depends on
        #[arg(long)]
        deps: Option<String>,
    },
    /// Apply pending migrations as a new batch
    Migrate {
        /// Print the plan without executing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Undo the most recent batch
    Rollback,
    /// Show the ledger
    Status,
    /// Check migration files against the ledger
    Verify,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    sqlmig::logging::init(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }
    if let Some(dir) = cli.migrations_dir {
        config.migrations_dir = dir;
    }

    match cli.command {
        Command::Init => commands::init(&config, cli.config.as_deref()).await,
        Command::Generate {
            name,
            description,
            deps,
        } => commands::generate(&config, &name, description.as_deref(), deps.as_deref()),
        Command::Migrate { dry_run } => commands::migrate(&config, dry_run).await,
        Command::Rollback => commands::rollback(&config).await,
        Command::Status => commands::status(&config).await,
        Command::Verify => commands::verify(&config).await,
    }
}
