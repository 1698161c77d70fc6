//! Orphan ledger port for resources awaiting reconciliation.

use crate::provisioning::domain::{OrphanId, OrphanedResource};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for orphan ledger operations.
pub type OrphanLedgerResult<T> = Result<T, OrphanLedgerError>;

/// Durable record of externally acquired resources without a local owner.
#[async_trait]
pub trait OrphanLedger: Send + Sync {
    /// Stores a new orphan entry.
    ///
    /// # Errors
    ///
    /// Returns [`OrphanLedgerError::Duplicate`] when the entry already exists.
    async fn record(&self, orphan: &OrphanedResource) -> OrphanLedgerResult<()>;

    /// Finds an entry by identifier.
    async fn find_by_id(&self, id: OrphanId) -> OrphanLedgerResult<Option<OrphanedResource>>;

    /// Returns unresolved entries, oldest first.
    async fn list_unresolved(&self) -> OrphanLedgerResult<Vec<OrphanedResource>>;

    /// Persists changes to an existing entry.
    ///
    /// # Errors
    ///
    /// Returns [`OrphanLedgerError::NotFound`] when the entry does not exist.
    async fn update(&self, orphan: &OrphanedResource) -> OrphanLedgerResult<()>;
}

/// Errors returned by orphan ledger implementations.
#[derive(Debug, Clone, Error)]
pub enum OrphanLedgerError {
    /// An entry with the same identifier already exists.
    #[error("duplicate orphan entry: {0}")]
    Duplicate(OrphanId),

    /// The entry was not found.
    #[error("orphan entry not found: {0}")]
    NotFound(OrphanId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted orphan data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl OrphanLedgerError {
    /// Wraps a data-quality error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
