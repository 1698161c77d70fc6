//! Company directory port.

use crate::provisioning::domain::{CompanyId, CompanyProfile};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for company directory operations.
pub type CompanyDirectoryResult<T> = Result<T, CompanyDirectoryError>;

/// Resolves and persists company profiles.
#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    /// Finds a company profile by identifier.
    ///
    /// Returns `None` when the company does not exist.
    async fn find_by_id(&self, id: CompanyId) -> CompanyDirectoryResult<Option<CompanyProfile>>;

    /// Persists changes to an existing company profile.
    ///
    /// # Errors
    ///
    /// Returns [`CompanyDirectoryError::NotFound`] when the company does not
    /// exist.
    async fn update(&self, profile: &CompanyProfile) -> CompanyDirectoryResult<()>;
}

/// Errors returned by company directory implementations.
#[derive(Debug, Clone, Error)]
pub enum CompanyDirectoryError {
    /// The company was not found.
    #[error("company not found: {0}")]
    NotFound(CompanyId),

    /// Persisted data could not be reconstructed into domain types.
    #[error("invalid persisted company data: {0}")]
    InvalidPersistedData(Arc<dyn std::error::Error + Send + Sync>),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl CompanyDirectoryError {
    /// Wraps a data-quality error from persisted rows.
    pub fn invalid_persisted_data(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InvalidPersistedData(Arc::new(err))
    }

    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
