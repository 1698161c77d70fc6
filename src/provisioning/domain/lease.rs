//! Time-bounded exclusive claims on a company.

use super::{CompanyId, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exclusive claim held by one provisioning run on a company.
///
/// A lease stops protecting the company once `expires_at` has passed, which
/// lets a crashed or cancelled run be superseded without operator action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyLease {
    company_id: CompanyId,
    holder: RunId,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CompanyLease {
    /// Creates a lease record.
    #[must_use]
    pub const fn new(
        company_id: CompanyId,
        holder: RunId,
        acquired_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            company_id,
            holder,
            acquired_at,
            expires_at,
        }
    }

    /// Returns the leased company.
    #[must_use]
    pub const fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// Returns the run holding the lease.
    #[must_use]
    pub const fn holder(&self) -> RunId {
        self.holder
    }

    /// Returns when the lease was acquired.
    #[must_use]
    pub const fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Returns when the lease lapses.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns `true` once the lease no longer protects the company.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
