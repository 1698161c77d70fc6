//! In-memory per-company lease manager.

use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::provisioning::{
    domain::{CompanyId, CompanyLease, RunId},
    ports::{CompanyLeaseManager, LeaseError, LeaseResult},
};

/// Thread-safe in-memory lease manager using an injected clock for expiry.
#[derive(Debug, Clone)]
pub struct InMemoryLeaseManager<C>
where
    C: Clock + Send + Sync,
{
    leases: Arc<RwLock<HashMap<CompanyId, CompanyLease>>>,
    clock: Arc<C>,
}

impl<C> InMemoryLeaseManager<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a lease manager with no leases.
    #[must_use]
    pub fn new(clock: Arc<C>) -> Self {
        Self {
            leases: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Returns the lease currently recorded for a company, expired or not.
    ///
    /// # Errors
    ///
    /// Returns backend errors when lock acquisition fails.
    pub fn current(&self, company_id: CompanyId) -> LeaseResult<Option<CompanyLease>> {
        let leases = self
            .leases
            .read()
            .map_err(|err| LeaseError::backend(std::io::Error::other(err.to_string())))?;
        Ok(leases.get(&company_id).cloned())
    }
}

#[async_trait]
impl<C> CompanyLeaseManager for InMemoryLeaseManager<C>
where
    C: Clock + Send + Sync,
{
    async fn try_acquire(
        &self,
        company_id: CompanyId,
        holder: RunId,
        ttl: Duration,
    ) -> LeaseResult<CompanyLease> {
        let now = self.clock.utc();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .filter(|delta| *delta > TimeDelta::zero())
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or(LeaseError::InvalidTtl(ttl))?;

        let mut leases = self
            .leases
            .write()
            .map_err(|err| LeaseError::backend(std::io::Error::other(err.to_string())))?;
        if let Some(existing) = leases.get(&company_id) {
            if existing.holder() != holder && !existing.is_expired(now) {
                return Err(LeaseError::Held {
                    company_id,
                    holder: existing.holder(),
                    expires_at: existing.expires_at(),
                });
            }
        }

        let lease = CompanyLease::new(company_id, holder, now, expires_at);
        leases.insert(company_id, lease.clone());
        Ok(lease)
    }

    async fn release(&self, lease: &CompanyLease) -> LeaseResult<()> {
        let mut leases = self
            .leases
            .write()
            .map_err(|err| LeaseError::backend(std::io::Error::other(err.to_string())))?;
        let held_by_caller = leases
            .get(&lease.company_id())
            .is_some_and(|current| current.holder() == lease.holder());
        if held_by_caller {
            leases.remove(&lease.company_id());
        }
        Ok(())
    }
}
