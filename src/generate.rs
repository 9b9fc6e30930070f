//! Scaffolding for new migrations.
//!
//! Pure: produces a record, never touches the ledger or the executor.
//! Persisting it is the job of [`crate::store::MigrationStore`].

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::record::{MigrationRecord, ROLLBACK_PLACEHOLDER, SQL_PLACEHOLDER};
use crate::validate::{ValidationError, Violation, dependency_violations};

/// Create a fresh record with a new UUID v4 and placeholder bodies.
///
/// Dependencies must be well-formed ids but need not exist yet. The
/// placeholder SQL is rejected by the validator until an author replaces it.
pub fn generate(
    name: &str,
    description: &str,
    dependencies: &[String],
) -> Result<MigrationRecord, ValidationError> {
    let id = Uuid::new_v4().to_string();

    let mut violations = Vec::new();
    if name.trim().is_empty() {
        violations.push(Violation::EmptyName);
    }
    violations.extend(dependency_violations(dependencies));
    if !violations.is_empty() {
        return Err(ValidationError { id, violations });
    }

    let mut seen = HashSet::new();
    let dependencies: Vec<String> = dependencies
        .iter()
        .filter(|dep| seen.insert(dep.as_str()))
        .cloned()
        .collect();

    Ok(MigrationRecord {
        id,
        name: name.trim().to_string(),
        description: description.trim().to_string(),
        dependencies,
        created_at: Some(Utc::now()),
        sql: SQL_PLACEHOLDER.to_string(),
        rollback: Some(ROLLBACK_PLACEHOLDER.to_string()),
    })
}

/// Parse a comma separated `--deps` list.
pub fn parse_dependency_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
