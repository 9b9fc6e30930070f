//! Read-only projections over the ledger: `status` and `verify`.

use std::collections::{HashMap, HashSet};

use crate::ledger::{self, Ledger, LedgerEntry, LedgerError};
use crate::record::MigrationRecord;
use crate::resolve::{ResolverError, resolve};
use crate::validate::{ValidationError, Warning, validate_all};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub total: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub latest_batch: Option<i64>,
    /// Ordered by batch, then attempt.
    pub entries: Vec<LedgerEntry>,
}

impl StatusReport {
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let success_count = entries.iter().filter(|e| e.success).count();
        Self {
            total: entries.len(),
            success_count,
            failed_count: entries.len() - success_count,
            latest_batch: ledger::latest_batch(&entries),
            entries,
        }
    }

    pub fn applied_ids(&self) -> HashSet<String> {
        ledger::applied_ids(&self.entries)
    }
}

/// Never creates the ledger; a ledger that does not exist yet reads as empty.
pub async fn status<L: Ledger + ?Sized>(ledger: &L) -> Result<StatusReport, LedgerError> {
    if !ledger.exists().await? {
        return Ok(StatusReport::default());
    }
    Ok(StatusReport::from_entries(ledger.entries().await?))
}

/// A record whose SQL changed after it was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumMismatch {
    pub id: String,
    pub name: String,
    pub applied: String,
    pub current: String,
}

#[derive(Debug, Default)]
pub struct VerifyReport {
    pub invalid: Vec<ValidationError>,
    pub warnings: Vec<(String, Warning)>,
    pub resolver: Option<ResolverError>,
    /// Applied ids with no record on disk.
    pub orphaned: Vec<String>,
    pub checksum_mismatches: Vec<ChecksumMismatch>,
    pub pending: usize,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
            && self.resolver.is_none()
            && self.orphaned.is_empty()
            && self.checksum_mismatches.is_empty()
    }
}

/// Check the candidate set and compare it with what the ledger says was applied.
pub async fn verify<L: Ledger + ?Sized>(
    candidates: &[MigrationRecord],
    ledger: &L,
) -> Result<VerifyReport, LedgerError> {
    let validation = validate_all(candidates);
    let report = status(ledger).await?;
    let applied = report.applied_ids();

    let mut out = VerifyReport {
        invalid: validation.errors,
        warnings: validation.warnings,
        ..VerifyReport::default()
    };

    match resolve(candidates, &applied) {
        Ok(ordered) => {
            out.pending = ordered.iter().filter(|r| !applied.contains(&r.id)).count();
        }
        Err(err) => out.resolver = Some(err),
    }

    let by_id: HashMap<&str, &MigrationRecord> =
        candidates.iter().map(|r| (r.id.as_str(), r)).collect();

    // Latest successful attempt per id.
    let mut latest: HashMap<&str, &LedgerEntry> = HashMap::new();
    for entry in report.entries.iter().filter(|e| e.success) {
        latest.insert(entry.id.as_str(), entry);
    }

    let mut latest: Vec<&LedgerEntry> = latest.into_values().collect();
    latest.sort_by_key(|e| e.attempt);

    for entry in latest {
        match by_id.get(entry.id.as_str()) {
            None => out.orphaned.push(entry.id.clone()),
            Some(record) => {
                let current = record.checksum();
                if current != entry.checksum {
                    out.checksum_mismatches.push(ChecksumMismatch {
                        id: entry.id.clone(),
                        name: entry.name.clone(),
                        applied: entry.checksum.clone(),
                        current,
                    });
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine;
    use crate::executor::RecordingExecutor;
    use crate::ledger::{MemoryLedger, SqlLedger};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const A: &str = "0b1f6a52-3c1e-4f6a-9d0e-2a7b5c4d3e21";
    const B: &str = "5e2d7c90-8a41-4b3f-b6e2-91c0d4f7a835";
    const C: &str = "c3a1e7f2-6b0d-4c8e-a5f9-7d2b1e0c4a66";

    fn record(id: &str, sql: &str) -> MigrationRecord {
        MigrationRecord::new(id, format!("m_{}", &id[..4]), sql).rollback("SELECT 1")
    }

    #[tokio::test]
    async fn test_status_counts() {
        let ledger = MemoryLedger::new();
        let executor = RecordingExecutor::new().fail_on("broken", "syntax error");
        let candidates = vec![record(A, "CREATE TABLE a (id int)"), record(B, "broken")];
        engine::run(&candidates, &ledger, &executor).await.unwrap();

        let report = status(&ledger).await.unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.success_count, 1);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.latest_batch, Some(1));
        assert_eq!(report.applied_ids(), HashSet::from([A.to_string()]));
    }

    #[tokio::test]
    async fn test_status_on_empty_ledger() {
        let report = status(&MemoryLedger::new()).await.unwrap();
        assert_eq!(report, StatusReport::default());
    }

    fn flag(present: bool) -> Vec<crate::executor::Row> {
        match serde_json::json!({ "present": present }) {
            serde_json::Value::Object(row) => vec![row],
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_status_never_creates_the_ledger() {
        let executor = Arc::new(RecordingExecutor::new().respond_to("to_regclass", flag(false)));
        let ledger = SqlLedger::new(executor.clone(), "_sqlmig_ledger").unwrap();

        let report = status(&ledger).await.unwrap();
        assert_eq!(report, StatusReport::default());

        let statements = executor.statements();
        assert_eq!(statements, vec!["SELECT to_regclass('_sqlmig_ledger') IS NOT NULL AS present"]);
        assert!(!statements.iter().any(|s| s.contains("CREATE")));

        // verify reads through the same path.
        verify(&[], &ledger).await.unwrap();
        assert!(!executor.statements().iter().any(|s| s.contains("CREATE")));
    }

    #[tokio::test]
    async fn test_status_reads_an_existing_ledger() {
        let executor = Arc::new(RecordingExecutor::new().respond_to("to_regclass", flag(true)));
        let ledger = SqlLedger::new(executor.clone(), "_sqlmig_ledger").unwrap();

        let report = status(&ledger).await.unwrap();
        assert_eq!(report.total, 0);

        let statements = executor.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[1].starts_with("SELECT attempt"));
    }

    #[tokio::test]
    async fn test_verify_clean() {
        let ledger = MemoryLedger::new();
        let candidates = vec![record(A, "CREATE TABLE a (id int)"), record(B, "CREATE TABLE b (id int)")];
        engine::run(&candidates[..1], &ledger, &RecordingExecutor::new()).await.unwrap();

        let report = verify(&candidates, &ledger).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.pending, 1);
    }

    #[tokio::test]
    async fn test_verify_detects_drift() {
        let ledger = MemoryLedger::new();
        let applied = vec![record(A, "CREATE TABLE a (id int)"), record(B, "CREATE TABLE b (id int)")];
        engine::run(&applied, &ledger, &RecordingExecutor::new()).await.unwrap();

        // A edited after it was applied, B deleted from disk, C is new but invalid.
        let on_disk = vec![
            record(A, "CREATE TABLE a (id bigint)"),
            MigrationRecord::new(C, "", "SELECT 1"),
        ];
        let report = verify(&on_disk, &ledger).await.unwrap();

        assert!(!report.is_clean());
        assert_eq!(report.orphaned, vec![B.to_string()]);
        assert_eq!(report.checksum_mismatches.len(), 1);
        assert_eq!(report.checksum_mismatches[0].id, A);
        assert_eq!(report.invalid.len(), 1);
        assert_eq!(report.invalid[0].id, C);
    }

    #[tokio::test]
    async fn test_verify_reports_cycles() {
        let candidates = vec![
            record(A, "SELECT 1").depends_on(B),
            record(B, "SELECT 1").depends_on(A),
        ];
        let report = verify(&candidates, &MemoryLedger::new()).await.unwrap();
        assert!(matches!(report.resolver, Some(ResolverError::Cycle(_))));
        assert!(!report.is_clean());
    }
}
