//! Migration records: the unit of schema change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Body written by the generator into the `sql` field of a fresh record.
pub const SQL_PLACEHOLDER: &str = "-- TODO: write the forward migration";

/// Body written by the generator into the `rollback` field of a fresh record.
pub const ROLLBACK_PLACEHOLDER: &str = "-- TODO: write the rollback";

/// A single, identified, forward schema change plus its metadata.
///
/// Records are never edited in place once applied: a change means replacing
/// the whole record before it reaches the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub sql: String,
    /// Statement(s) undoing `sql`. Supplied by the author, never inferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<String>,
}

impl MigrationRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            dependencies: Vec::new(),
            created_at: None,
            sql: sql.into(),
            rollback: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn rollback(mut self, sql: impl Into<String>) -> Self {
        self.rollback = Some(sql.into());
        self
    }

    /// SHA-256 of the forward SQL, hex encoded.
    pub fn checksum(&self) -> String {
        checksum(&self.sql)
    }

    /// The rollback directive, if it contains an actual statement.
    pub fn rollback_directive(&self) -> Option<&str> {
        self.rollback
            .as_deref()
            .filter(|sql| !is_blank_sql(sql))
    }
}

/// SHA-256 of `sql`, hex encoded.
pub fn checksum(sql: &str) -> String {
    format!("{:x}", Sha256::digest(sql.as_bytes()))
}

/// True when `sql` holds nothing but whitespace and `--` line comments.
pub fn is_blank_sql(sql: &str) -> bool {
    sql.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}
