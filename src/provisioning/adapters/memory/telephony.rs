//! In-memory telephony provider backed by a fixed number inventory.

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use crate::provisioning::{
    domain::{CountryCode, NumberPolicy, TelephonyNumber},
    ports::{TelephonyError, TelephonyProvider, TelephonyResult},
};

/// In-memory telephony provider.
///
/// Purchases take the first inventory entries matching the policy, in
/// insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTelephonyProvider {
    state: Arc<RwLock<InMemoryTelephonyState>>,
}

#[derive(Debug, Clone)]
struct InventoryEntry {
    number: TelephonyNumber,
    country: CountryCode,
    sms_capable: bool,
}

#[derive(Debug, Default)]
struct InMemoryTelephonyState {
    acquire_calls: usize,
    inventory: Vec<InventoryEntry>,
    purchased: Vec<TelephonyNumber>,
    released: Vec<TelephonyNumber>,
    fail_purchases: bool,
    fail_releases: bool,
    stall_purchases: bool,
}

impl InMemoryTelephonyProvider {
    /// Creates a provider with an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a number to the purchasable inventory.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn add_available(
        &self,
        number: TelephonyNumber,
        country: CountryCode,
        sms_capable: bool,
    ) -> TelephonyResult<()> {
        let mut state = self.write_state()?;
        state.inventory.push(InventoryEntry {
            number,
            country,
            sms_capable,
        });
        Ok(())
    }

    /// Makes every purchase fail.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn set_fail_purchases(&self, fail: bool) -> TelephonyResult<()> {
        self.write_state()?.fail_purchases = fail;
        Ok(())
    }

    /// Makes every release fail with a rejected status.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn set_fail_releases(&self, fail: bool) -> TelephonyResult<()> {
        self.write_state()?.fail_releases = fail;
        Ok(())
    }

    /// Makes purchases never complete, as if the provider stopped answering.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn set_stall_purchases(&self, stall: bool) -> TelephonyResult<()> {
        self.write_state()?.stall_purchases = stall;
        Ok(())
    }

    /// Returns how many acquisitions were requested.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn acquire_calls(&self) -> TelephonyResult<usize> {
        Ok(self.read_state()?.acquire_calls)
    }

    /// Returns numbers currently owned, in purchase order.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn purchased(&self) -> TelephonyResult<Vec<TelephonyNumber>> {
        Ok(self.read_state()?.purchased.clone())
    }

    /// Returns numbers released back to the provider, in release order.
    ///
    /// # Errors
    ///
    /// Returns transport errors when lock acquisition fails.
    pub fn released(&self) -> TelephonyResult<Vec<TelephonyNumber>> {
        Ok(self.read_state()?.released.clone())
    }

    fn read_state(&self) -> TelephonyResult<std::sync::RwLockReadGuard<'_, InMemoryTelephonyState>> {
        self.state
            .read()
            .map_err(|err| TelephonyError::transport(std::io::Error::other(err.to_string())))
    }

    fn write_state(
        &self,
    ) -> TelephonyResult<std::sync::RwLockWriteGuard<'_, InMemoryTelephonyState>> {
        self.state
            .write()
            .map_err(|err| TelephonyError::transport(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl TelephonyProvider for InMemoryTelephonyProvider {
    async fn acquire_number(&self, policy: &NumberPolicy) -> TelephonyResult<TelephonyNumber> {
        let stalled = {
            let mut state = self.write_state()?;
            state.acquire_calls = state.acquire_calls.saturating_add(1);
            state.stall_purchases
        };
        if stalled {
            return std::future::pending().await;
        }

        let mut state = self.write_state()?;
        let candidate = state.inventory.iter().position(|entry| {
            entry.country == *policy.country() && (entry.sms_capable || !policy.sms_required())
        });
        let Some(index) = candidate else {
            return Err(TelephonyError::NoNumberAvailable {
                country: policy.country().to_string(),
            });
        };

        if state.fail_purchases {
            let number = state
                .inventory
                .get(index)
                .map(|entry| entry.number.to_string())
                .unwrap_or_default();
            return Err(TelephonyError::PurchaseFailed {
                number,
                reason: "purchase declined".to_owned(),
            });
        }

        let entry = state.inventory.remove(index);
        state.purchased.push(entry.number.clone());
        Ok(entry.number)
    }

    async fn release_number(&self, number: &TelephonyNumber) -> TelephonyResult<()> {
        let mut state = self.write_state()?;
        if state.fail_releases {
            return Err(TelephonyError::Rejected {
                status: 503,
                body: "telephony provider unavailable".to_owned(),
            });
        }
        let Some(index) = state.purchased.iter().position(|owned| owned == number) else {
            return Err(TelephonyError::UnknownNumber(number.to_string()));
        };
        let owned = state.purchased.remove(index);
        state.released.push(owned);
        Ok(())
    }
}
