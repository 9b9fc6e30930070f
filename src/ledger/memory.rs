//! In-process ledger. Nothing survives the process; used by tests and embedded callers.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::{Ledger, LedgerEntry, LedgerError, NewEntry};

#[derive(Default)]
struct State {
    entries: Vec<LedgerEntry>,
    last_attempt: i64,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing entries, e.g. a snapshot read from another ledger.
    pub fn with_entries(entries: Vec<LedgerEntry>) -> Self {
        let last_attempt = entries.iter().map(|e| e.attempt).max().unwrap_or(0);
        Self {
            state: Mutex::new(State {
                entries,
                last_attempt,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn ensure(&self) -> Result<(), LedgerError> {
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut entries = self.lock().entries.clone();
        entries.sort_by_key(|e| (e.batch, e.attempt));
        Ok(entries)
    }

    async fn insert(&self, entry: NewEntry) -> Result<LedgerEntry, LedgerError> {
        let mut state = self.lock();
        state.last_attempt += 1;
        let entry = entry.into_entry(state.last_attempt);
        state.entries.push(entry.clone());
        Ok(entry)
    }

    async fn delete(&self, attempt: i64) -> Result<(), LedgerError> {
        self.lock().entries.retain(|e| e.attempt != attempt);
        Ok(())
    }
}
