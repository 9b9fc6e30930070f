//! Migration creation

use anyhow::Result;
use colored::*;

use crate::config::Config;
use crate::generate::parse_dependency_list;

/// Scaffold a new migration file.
pub fn generate(config: &Config, name: &str, description: Option<&str>, deps: Option<&str>) -> Result<()> {
    println!("{}", "📝 Creating Migration".cyan().bold());
    println!();

    let dependencies = deps.map(parse_dependency_list).unwrap_or_default();
    let record = crate::generate::generate(name, description.unwrap_or_default(), &dependencies)?;

    let store = super::store(config);
    if store.init()? {
        println!("  Created {} directory", store.dir().display().to_string().yellow());
    }
    let path = store.write(&record)?;

    println!("  {} {}", "✓ Created:".green(), path.display());
    println!();
    println!("  Id:        {}", record.id.cyan());
    println!("  Name:      {}", record.name);
    if !record.description.is_empty() {
        println!("  About:     {}", record.description.dimmed());
    }
    if !record.dependencies.is_empty() {
        println!("  Depends:   {}", record.dependencies.join(", ").yellow());
    }
    println!();
    println!("  Fill in `sql` and `rollback`, then run:");
    println!("    {}", "sqlmig migrate".cyan());

    Ok(())
}
