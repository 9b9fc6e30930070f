//! In-process executor that records statements instead of running them.
//!
//! Failures and result rows are scripted by substring match. Used by tests and
//! by library callers that want to see the SQL a run would issue.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{ExecutionError, Executor, Row};

#[derive(Default)]
struct Script {
    statements: Vec<String>,
    failures: Vec<(String, String)>,
    responses: Vec<(String, Vec<Row>)>,
}

#[derive(Default)]
pub struct RecordingExecutor {
    script: Mutex<Script>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any statement containing `needle` with a database error.
    pub fn fail_on(self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.lock().failures.push((needle.into(), message.into()));
        self
    }

    /// Answer any statement containing `needle` with `rows`.
    pub fn respond_to(self, needle: impl Into<String>, rows: Vec<Row>) -> Self {
        self.lock().responses.push((needle.into(), rows));
        self
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Every statement received so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<Option<Vec<Row>>, ExecutionError> {
        let mut script = self.lock();
        script.statements.push(sql.to_string());

        if let Some((_, message)) = script.failures.iter().find(|(needle, _)| sql.contains(needle.as_str())) {
            return Err(ExecutionError::Database(message.clone()));
        }

        Ok(script
            .responses
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_records_and_scripts() {
        let mut row = Row::new();
        row.insert("n".into(), json!(1));

        let executor = RecordingExecutor::new()
            .fail_on("DROP", "permission denied")
            .respond_to("SELECT", vec![row.clone()]);

        assert_eq!(executor.execute("CREATE TABLE t (id int)").await, Ok(None));
        assert_eq!(executor.execute("SELECT 1 AS n").await, Ok(Some(vec![row])));
        assert_eq!(
            executor.execute("DROP TABLE t").await,
            Err(ExecutionError::Database("permission denied".into()))
        );

        executor.clear_failures();
        assert_eq!(executor.execute("DROP TABLE t").await, Ok(None));
        assert_eq!(executor.statements().len(), 4);
    }
}
