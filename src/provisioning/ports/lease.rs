//! Per-company lease port serializing provisioning runs.

use crate::provisioning::domain::{CompanyId, CompanyLease, RunId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for lease operations.
pub type LeaseResult<T> = Result<T, LeaseError>;

/// Grants time-bounded exclusive claims on companies.
#[async_trait]
pub trait CompanyLeaseManager: Send + Sync {
    /// Claims the company for `holder` for `ttl`.
    ///
    /// An expired lease held by another run is taken over.
    ///
    /// # Errors
    ///
    /// Returns [`LeaseError::Held`] when another run holds an unexpired lease.
    async fn try_acquire(
        &self,
        company_id: CompanyId,
        holder: RunId,
        ttl: Duration,
    ) -> LeaseResult<CompanyLease>;

    /// Gives up a lease. Releasing a lease that was already taken over is a
    /// no-op.
    async fn release(&self, lease: &CompanyLease) -> LeaseResult<()>;
}

/// Errors returned by lease manager implementations.
#[derive(Debug, Clone, Error)]
pub enum LeaseError {
    /// Another run holds an unexpired lease on the company.
    #[error("company {company_id} is leased by run {holder} until {expires_at}")]
    Held {
        /// Leased company.
        company_id: CompanyId,
        /// Run holding the lease.
        holder: RunId,
        /// When the lease lapses.
        expires_at: DateTime<Utc>,
    },

    /// The requested time-to-live is zero or cannot be represented.
    #[error("lease ttl {0:?} is out of range")]
    InvalidTtl(Duration),

    /// Lease store failure.
    #[error("lease backend error: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),
}

impl LeaseError {
    /// Wraps a lease store error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(err))
    }
}
