//! Ledger double whose writes start failing on cue.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{Ledger, LedgerEntry, LedgerError, MemoryLedger, NewEntry};
use crate::executor::ExecutionError;

pub(crate) struct FailingLedger {
    inner: MemoryLedger,
    inserts_allowed: Option<usize>,
    inserts: AtomicUsize,
    fail_deletes: bool,
}

impl FailingLedger {
    pub(crate) fn new(inner: MemoryLedger) -> Self {
        Self {
            inner,
            inserts_allowed: None,
            inserts: AtomicUsize::new(0),
            fail_deletes: false,
        }
    }

    /// Accept `n` inserts, then fail every later one.
    pub(crate) fn fail_inserts_after(mut self, n: usize) -> Self {
        self.inserts_allowed = Some(n);
        self
    }

    pub(crate) fn fail_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub(crate) fn inner(&self) -> &MemoryLedger {
        &self.inner
    }
}

fn unavailable() -> LedgerError {
    LedgerError::Storage(ExecutionError::Transport("connection reset by peer".into()))
}

#[async_trait]
impl Ledger for FailingLedger {
    async fn ensure(&self) -> Result<(), LedgerError> {
        self.inner.ensure().await
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.inner.entries().await
    }

    async fn insert(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        let seen = self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.inserts_allowed.is_some_and(|allowed| seen >= allowed) {
            return Err(unavailable());
        }
        self.inner.insert(entry).await
    }

    async fn delete(&self, attempt: i64) -> Result<(), LedgerError> {
        if self.fail_deletes {
            return Err(unavailable());
        }
        self.inner.delete(attempt).await
    }
}
