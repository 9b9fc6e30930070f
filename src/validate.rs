//! Structural checks run on a record before it is accepted into a run.
//!
//! Existence of dependencies is not checked here; a dependency may sit in the
//! same candidate set, which only the resolver sees.

use std::fmt;

use uuid::Uuid;

use crate::record::{MigrationRecord, is_blank_sql};

/// A single broken rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    InvalidId(String),
    EmptyName,
    EmptySql,
    InvalidDependency(String),
    SelfDependency,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::InvalidId(id) => write!(f, "id '{}' is not a canonical UUID", id),
            Violation::EmptyName => write!(f, "name is empty"),
            Violation::EmptySql => write!(f, "sql is empty"),
            Violation::InvalidDependency(dep) => {
                write!(f, "dependency '{}' is not a canonical UUID", dep)
            }
            Violation::SelfDependency => write!(f, "migration depends on itself"),
        }
    }
}

/// Every rule a record violates, not just the first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("migration '{id}' is invalid: {}", join_violations(.violations))]
pub struct ValidationError {
    pub id: String,
    pub violations: Vec<Violation>,
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Non-fatal authoring issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The record cannot be rolled back automatically.
    MissingRollback,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingRollback => write!(f, "no rollback directive; rollback will refuse this migration"),
        }
    }
}

/// Outcome of validating a whole candidate set.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<(String, Warning)>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Canonical identifier: hyphenated UUID text.
pub fn is_valid_id(id: &str) -> bool {
    id.len() == 36 && Uuid::parse_str(id).is_ok()
}

/// Check one record. Returns the warnings on success.
pub fn validate(record: &MigrationRecord) -> Result<Vec<Warning>, ValidationError> {
    let mut violations = Vec::new();

    if !is_valid_id(&record.id) {
        violations.push(Violation::InvalidId(record.id.clone()));
    }
    if record.name.trim().is_empty() {
        violations.push(Violation::EmptyName);
    }
    if is_blank_sql(&record.sql) {
        violations.push(Violation::EmptySql);
    }
    violations.extend(dependency_violations(&record.dependencies));
    if record.dependencies.iter().any(|dep| dep == &record.id) {
        violations.push(Violation::SelfDependency);
    }

    if !violations.is_empty() {
        return Err(ValidationError {
            id: record.id.clone(),
            violations,
        });
    }

    let mut warnings = Vec::new();
    if record.rollback_directive().is_none() {
        warnings.push(Warning::MissingRollback);
    }
    Ok(warnings)
}

/// Check a slice of records, collecting errors and warnings for all of them.
pub fn validate_all(records: &[MigrationRecord]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for record in records {
        match validate(record) {
            Ok(warnings) => report
                .warnings
                .extend(warnings.into_iter().map(|w| (record.id.clone(), w))),
            Err(err) => report.errors.push(err),
        }
    }
    report
}

pub(crate) fn dependency_violations(dependencies: &[String]) -> Vec<Violation> {
    dependencies
        .iter()
        .filter(|dep| !is_valid_id(dep))
        .map(|dep| Violation::InvalidDependency(dep.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ID_A: &str = "0b1f6a52-3c1e-4f6a-9d0e-2a7b5c4d3e21";
    const ID_B: &str = "5e2d7c90-8a41-4b3f-b6e2-91c0d4f7a835";

    #[test]
    fn test_valid_id() {
        assert!(is_valid_id(ID_A));
        assert!(!is_valid_id("m1"));
        assert!(!is_valid_id("0b1f6a523c1e4f6a9d0e2a7b5c4d3e21"));
        assert!(!is_valid_id("{0b1f6a52-3c1e-4f6a-9d0e-2a7b5c4d3e21}"));
        assert!(!is_valid_id("0b1f6a52-3c1e-4f6a-9d0e-2a7b5c4d3eZZ"));
    }

    #[test]
    fn test_accepts_well_formed_record() {
        let record = MigrationRecord::new(ID_B, "add_sponsors", "CREATE TABLE sponsors (id int)")
            .depends_on(ID_A)
            .rollback("DROP TABLE sponsors");
        assert_eq!(validate(&record), Ok(vec![]));
    }

    #[test]
    fn test_missing_rollback_is_a_warning() {
        let record = MigrationRecord::new(ID_A, "events", "CREATE TABLE events (id int)");
        assert_eq!(validate(&record), Ok(vec![Warning::MissingRollback]));
    }

    #[test]
    fn test_collects_every_violation() {
        let record = MigrationRecord::new("not-a-uuid", "  ", "-- TODO")
            .depends_on("m1")
            .depends_on(ID_A)
            .depends_on("not-a-uuid");

        let err = validate(&record).unwrap_err();
        assert_eq!(
            err.violations,
            vec![
                Violation::InvalidId("not-a-uuid".into()),
                Violation::EmptyName,
                Violation::EmptySql,
                Violation::InvalidDependency("m1".into()),
                Violation::InvalidDependency("not-a-uuid".into()),
                Violation::SelfDependency,
            ]
        );
        let message = err.to_string();
        assert!(message.contains("name is empty") && message.contains("'m1'"));
    }

    #[test]
    fn test_validate_all_groups_by_record() {
        let good = MigrationRecord::new(ID_A, "a", "SELECT 1").rollback("SELECT 1");
        let warn = MigrationRecord::new(ID_B, "b", "SELECT 2");
        let bad = MigrationRecord::new("m3", "c", "");

        let report = validate_all(&[good, warn, bad]);
        assert!(!report.is_ok());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].id, "m3");
        assert_eq!(report.warnings, vec![(ID_B.to_string(), Warning::MissingRollback)]);
    }
}
