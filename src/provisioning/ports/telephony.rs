//! Telephony provisioning provider port.

use crate::provisioning::domain::{NumberPolicy, TelephonyNumber};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for telephony provider operations.
pub type TelephonyResult<T> = Result<T, TelephonyError>;

/// Remote service searching for and purchasing phone numbers.
///
/// Search and purchase form one operation from the caller's point of view:
/// the returned result is authoritative and callers never inspect partial
/// provider state.
#[async_trait]
pub trait TelephonyProvider: Send + Sync {
    /// Searches for numbers matching the policy and purchases one.
    ///
    /// # Errors
    ///
    /// Returns [`TelephonyError::NoNumberAvailable`] when the search yields no
    /// eligible candidate and [`TelephonyError::PurchaseFailed`] when every
    /// candidate purchase fails.
    async fn acquire_number(&self, policy: &NumberPolicy) -> TelephonyResult<TelephonyNumber>;

    /// Releases a purchased number back to the provider.
    async fn release_number(&self, number: &TelephonyNumber) -> TelephonyResult<()>;
}

/// Errors returned by telephony provider adapters.
#[derive(Debug, Clone, Error)]
pub enum TelephonyError {
    /// The search yielded no eligible number.
    #[error("no telephony number available in {country}")]
    NoNumberAvailable {
        /// Country searched.
        country: String,
    },

    /// Purchasing the selected number failed.
    #[error("purchase of {number} failed: {reason}")]
    PurchaseFailed {
        /// Number whose purchase failed last.
        number: String,
        /// Provider-reported reason.
        reason: String,
    },

    /// The number is not owned by this account.
    #[error("telephony number {0} is not owned by this account")]
    UnknownNumber(String),

    /// The provider rejected the request with a non-success status.
    #[error("telephony provider rejected the request with status {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The call did not complete within the step deadline.
    #[error("telephony provider did not answer within {0:?}")]
    TimedOut(Duration),

    /// Transport or decoding failure.
    #[error("telephony provider transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl TelephonyError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}
