//! Crate-level error: every component error in one place.

use crate::config::ConfigError;
use crate::engine::EngineError;
use crate::executor::ExecutionError;
use crate::ledger::LedgerError;
use crate::lock::LockError;
use crate::resolve::ResolverError;
use crate::rollback::RollbackError;
use crate::store::StoreError;
use crate::validate::ValidationError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{} migration(s) failed validation:\n{}", .0.len(), list(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Resolve(#[from] ResolverError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Rollback(#[from] RollbackError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Resolve(err) => Error::Resolve(err),
            EngineError::Ledger(err) => Error::Ledger(err),
        }
    }
}

fn list(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Violation;

    #[test]
    fn test_error_display() {
        let err = Error::Invalid(vec![
            ValidationError {
                id: "m1".into(),
                violations: vec![Violation::InvalidId("m1".into())],
            },
            ValidationError {
                id: "m2".into(),
                violations: vec![Violation::EmptySql],
            },
        ]);
        let message = err.to_string();
        assert!(message.starts_with("2 migration(s) failed validation"));
        assert!(message.contains("'m1'") && message.contains("sql is empty"));

        let err: Error = EngineError::Resolve(ResolverError::DuplicateId("x".into())).into();
        assert_eq!(err.to_string(), "duplicate migration id 'x'");
    }
}
