//! Company profile as seen by the provisioning workflow.

use super::{CompanyId, ProvisioningDomainError, TelephonyNumber};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-empty company display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyName(String);

impl CompanyName {
    /// Creates a validated company name.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningDomainError::EmptyCompanyName`] when the value is
    /// empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, ProvisioningDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProvisioningDomainError::EmptyCompanyName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompanyName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Company profile owned by the company directory.
///
/// The provisioning workflow reads one instance near the start of a run and,
/// on success, attaches the purchased number and writes it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    id: CompanyId,
    name: CompanyName,
    telephony_number: Option<TelephonyNumber>,
}

impl CompanyProfile {
    /// Creates a company profile without a telephony number.
    #[must_use]
    pub const fn new(id: CompanyId, name: CompanyName) -> Self {
        Self {
            id,
            name,
            telephony_number: None,
        }
    }

    /// Sets the telephony number while building a profile.
    #[must_use]
    pub fn with_telephony_number(mut self, number: TelephonyNumber) -> Self {
        self.telephony_number = Some(number);
        self
    }

    /// Returns the company identifier.
    #[must_use]
    pub const fn id(&self) -> CompanyId {
        self.id
    }

    /// Returns the company display name.
    #[must_use]
    pub const fn name(&self) -> &CompanyName {
        &self.name
    }

    /// Returns the attached telephony number, if any.
    #[must_use]
    pub const fn telephony_number(&self) -> Option<&TelephonyNumber> {
        self.telephony_number.as_ref()
    }

    /// Attaches a telephony number, replacing any previous one.
    pub fn attach_number(&mut self, number: TelephonyNumber) {
        self.telephony_number = Some(number);
    }
}
