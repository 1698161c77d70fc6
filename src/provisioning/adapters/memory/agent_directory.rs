//! In-memory agent directory.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::provisioning::{
    domain::{AgentId, AgentRecord, CompanyId, NewAgentRecord},
    ports::{AgentDirectory, AgentDirectoryError, AgentDirectoryResult},
};

/// Thread-safe in-memory agent directory assigning sequential identifiers.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAgentDirectory {
    state: Arc<RwLock<InMemoryAgentState>>,
}

#[derive(Debug, Default)]
struct InMemoryAgentState {
    last_id: i64,
    records: BTreeMap<AgentId, AgentRecord>,
    fail_inserts: bool,
    fail_deletes: bool,
}

impl InMemoryAgentDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent insert fail with a persistence error.
    ///
    /// # Errors
    ///
    /// Returns persistence errors when lock acquisition fails.
    pub fn set_fail_inserts(&self, fail: bool) -> AgentDirectoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            AgentDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state.fail_inserts = fail;
        Ok(())
    }

    /// Makes every subsequent delete fail with a persistence error.
    ///
    /// # Errors
    ///
    /// Returns persistence errors when lock acquisition fails.
    pub fn set_fail_deletes(&self, fail: bool) -> AgentDirectoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            AgentDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state.fail_deletes = fail;
        Ok(())
    }
}

#[async_trait]
impl AgentDirectory for InMemoryAgentDirectory {
    async fn insert(&self, record: &NewAgentRecord) -> AgentDirectoryResult<AgentRecord> {
        let mut state = self.state.write().map_err(|err| {
            AgentDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        if state.fail_inserts {
            return Err(AgentDirectoryError::persistence(std::io::Error::other(
                "agent directory unavailable",
            )));
        }

        let next = state.last_id.saturating_add(1);
        let id = AgentId::new(next).map_err(AgentDirectoryError::persistence)?;
        state.last_id = next;
        let stored = AgentRecord::from_new(id, record.clone());
        state.records.insert(id, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, id: AgentId) -> AgentDirectoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            AgentDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        if state.fail_deletes {
            return Err(AgentDirectoryError::persistence(std::io::Error::other(
                "agent directory unavailable",
            )));
        }
        state
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(AgentDirectoryError::NotFound(id))
    }

    async fn find_by_company(&self, company_id: CompanyId) -> AgentDirectoryResult<Vec<AgentRecord>> {
        let state = self.state.read().map_err(|err| {
            AgentDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state
            .records
            .values()
            .filter(|record| record.company_id() == company_id)
            .cloned()
            .collect())
    }
}
