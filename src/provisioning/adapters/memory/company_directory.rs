//! In-memory company directory.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::provisioning::{
    domain::{CompanyId, CompanyProfile},
    ports::{CompanyDirectory, CompanyDirectoryError, CompanyDirectoryResult},
};

/// Thread-safe in-memory company directory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCompanyDirectory {
    state: Arc<RwLock<InMemoryCompanyState>>,
}

#[derive(Debug, Default)]
struct InMemoryCompanyState {
    companies: HashMap<CompanyId, CompanyProfile>,
    fail_updates: bool,
}

impl InMemoryCompanyDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a company profile.
    ///
    /// # Errors
    ///
    /// Returns persistence errors when lock acquisition fails.
    pub fn insert_company(&self, profile: CompanyProfile) -> CompanyDirectoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            CompanyDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state.companies.insert(profile.id(), profile);
        Ok(())
    }

    /// Makes every subsequent update fail with a persistence error.
    ///
    /// # Errors
    ///
    /// Returns persistence errors when lock acquisition fails.
    pub fn set_fail_updates(&self, fail: bool) -> CompanyDirectoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            CompanyDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        state.fail_updates = fail;
        Ok(())
    }
}

#[async_trait]
impl CompanyDirectory for InMemoryCompanyDirectory {
    async fn find_by_id(&self, id: CompanyId) -> CompanyDirectoryResult<Option<CompanyProfile>> {
        let state = self.state.read().map_err(|err| {
            CompanyDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        Ok(state.companies.get(&id).cloned())
    }

    async fn update(&self, profile: &CompanyProfile) -> CompanyDirectoryResult<()> {
        let mut state = self.state.write().map_err(|err| {
            CompanyDirectoryError::persistence(std::io::Error::other(err.to_string()))
        })?;
        if state.fail_updates {
            return Err(CompanyDirectoryError::persistence(std::io::Error::other(
                "company directory unavailable",
            )));
        }
        let stored = state
            .companies
            .get_mut(&profile.id())
            .ok_or(CompanyDirectoryError::NotFound(profile.id()))?;
        *stored = profile.clone();
        Ok(())
    }
}
