//! Agent directory port.

use crate::provisioning::domain::{AgentId, AgentRecord, CompanyId, NewAgentRecord};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for agent directory operations.
pub type AgentDirectoryResult<T> = Result<T, AgentDirectoryError>;

/// Persists agent records.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    /// Inserts a new agent record and returns it with its assigned identifier.
    async fn insert(&self, record: &NewAgentRecord) -> AgentDirectoryResult<AgentRecord>;

    /// Deletes an agent record.
    ///
    /// # Errors
    ///
    /// Returns [`AgentDirectoryError::NotFound`] when the record does not
    /// exist.
    async fn delete(&self, id: AgentId) -> AgentDirectoryResult<()>;

    /// Returns every agent record owned by a company, oldest first.
    async fn find_by_company(&self, company_id: CompanyId) -> AgentDirectoryResult<Vec<AgentRecord>>;
}

/// Errors returned by agent directory implementations.
#[derive(Debug, Clone, Error)]
pub enum AgentDirectoryError {
    /// The agent record was not found.
    #[error("agent record not found: {0}")]
    NotFound(AgentId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted agent data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl AgentDirectoryError {
    /// Wraps a data-quality error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
