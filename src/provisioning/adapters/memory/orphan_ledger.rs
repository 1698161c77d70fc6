//! In-memory orphan ledger.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::provisioning::{
    domain::{OrphanId, OrphanedResource},
    ports::{OrphanLedger, OrphanLedgerError, OrphanLedgerResult},
};

/// Thread-safe in-memory orphan ledger preserving insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrphanLedger {
    state: Arc<RwLock<InMemoryLedgerState>>,
}

#[derive(Debug, Default)]
struct InMemoryLedgerState {
    entries: Vec<OrphanedResource>,
    fail_records: bool,
}

impl InMemoryOrphanLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent record fail with a persistence error.
    ///
    /// # Errors
    ///
    /// Returns persistence errors when lock acquisition fails.
    pub fn set_fail_records(&self, fail: bool) -> OrphanLedgerResult<()> {
        let mut state = self.state.write().map_err(|err| {
            OrphanLedgerError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state.fail_records = fail;
        Ok(())
    }

    /// Returns every entry, resolved or not, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns persistence errors when lock acquisition fails.
    pub fn entries(&self) -> OrphanLedgerResult<Vec<OrphanedResource>> {
        let state = self.state.read().map_err(|err| {
            OrphanLedgerError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.entries.clone())
    }
}

#[async_trait]
impl OrphanLedger for InMemoryOrphanLedger {
    async fn record(&self, orphan: &OrphanedResource) -> OrphanLedgerResult<()> {
        let mut state = self.state.write().map_err(|err| {
            OrphanLedgerError::persistence(std::io::Error::other(err.to_string()))
        })?;
        if state.fail_records {
            return Err(OrphanLedgerError::persistence(std::io::Error::other(
                "orphan ledger unavailable",
            )));
        }
        if state.entries.iter().any(|entry| entry.id() == orphan.id()) {
            return Err(OrphanLedgerError::Duplicate(orphan.id()));
        }
        state.entries.push(orphan.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: OrphanId) -> OrphanLedgerResult<Option<OrphanedResource>> {
        let state = self.state.read().map_err(|err| {
            OrphanLedgerError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.entries.iter().find(|entry| entry.id() == id).cloned())
    }

    async fn list_unresolved(&self) -> OrphanLedgerResult<Vec<OrphanedResource>> {
        let state = self.state.read().map_err(|err| {
            OrphanLedgerError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state
            .entries
            .iter()
            .filter(|entry| !entry.is_resolved())
            .cloned()
            .collect())
    }

    async fn update(&self, orphan: &OrphanedResource) -> OrphanLedgerResult<()> {
        let mut state = self.state.write().map_err(|err| {
            OrphanLedgerError::persistence(std::io::Error::other(err.to_string()))
        })?;
        let stored = state
            .entries
            .iter_mut()
            .find(|entry| entry.id() == orphan.id())
            .ok_or(OrphanLedgerError::NotFound(orphan.id()))?;
        *stored = orphan.clone();
        Ok(())
    }
}
