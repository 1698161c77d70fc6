//! Telephony numbers and the policy used to acquire them.

use super::ProvisioningDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Minimum digit count accepted after the leading `+`.
const MIN_E164_DIGITS: usize = 8;
/// Maximum digit count allowed by E.164.
const MAX_E164_DIGITS: usize = 15;
/// Upper bound on candidates requested from a number search.
const MAX_CANDIDATE_LIMIT: u32 = 50;

/// Telephony number in E.164 format (for example `+14155550100`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TelephonyNumber(String);

impl TelephonyNumber {
    /// Creates a validated telephony number.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningDomainError::InvalidTelephonyNumber`] unless the
    /// value is a `+` followed by 8 to 15 ASCII digits.
    pub fn new(value: impl Into<String>) -> Result<Self, ProvisioningDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or_default();
        let is_valid = (MIN_E164_DIGITS..=MAX_E164_DIGITS).contains(&digits.len())
            && digits.chars().all(|c| c.is_ascii_digit());

        if !is_valid {
            return Err(ProvisioningDomainError::InvalidTelephonyNumber(raw));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the number as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TelephonyNumber {
    type Error = ProvisioningDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TelephonyNumber> for String {
    fn from(value: TelephonyNumber) -> Self {
        value.0
    }
}

impl AsRef<str> for TelephonyNumber {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for TelephonyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ISO 3166-1 alpha-2 country code, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    /// Creates a validated country code.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningDomainError::InvalidCountryCode`] unless the
    /// trimmed value is exactly two ASCII letters.
    pub fn new(value: impl Into<String>) -> Result<Self, ProvisioningDomainError> {
        let raw = value.into();
        let normalized = raw.trim().to_ascii_uppercase();
        if normalized.len() != 2 || !normalized.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ProvisioningDomainError::InvalidCountryCode(raw));
        }
        Ok(Self(normalized))
    }

    /// Returns the code as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Webhook URLs registered on a purchased number for inbound traffic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InboundCallbacks {
    /// Receives inbound SMS notifications.
    pub sms_url: Option<Url>,
    /// Receives inbound voice call notifications.
    pub voice_url: Option<Url>,
}

impl InboundCallbacks {
    /// Returns `true` when no callback is configured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.sms_url.is_none() && self.voice_url.is_none()
    }
}

/// Region and capability policy applied when searching for a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberPolicy {
    country: CountryCode,
    sms_required: bool,
    candidate_limit: u32,
    area_code: Option<String>,
    callbacks: InboundCallbacks,
}

impl NumberPolicy {
    /// Creates a policy for one SMS-capable number in the given country.
    #[must_use]
    pub fn new(country: CountryCode) -> Self {
        Self {
            country,
            sms_required: true,
            candidate_limit: 1,
            area_code: None,
            callbacks: InboundCallbacks::default(),
        }
    }

    /// Sets whether candidates must support SMS.
    #[must_use]
    pub const fn with_sms_required(mut self, sms_required: bool) -> Self {
        self.sms_required = sms_required;
        self
    }

    /// Sets how many candidates a search may return and purchase may try.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningDomainError::InvalidCandidateLimit`] when the
    /// limit is zero or above 50.
    pub fn with_candidate_limit(mut self, limit: u32) -> Result<Self, ProvisioningDomainError> {
        if limit == 0 || limit > MAX_CANDIDATE_LIMIT {
            return Err(ProvisioningDomainError::InvalidCandidateLimit(limit));
        }
        self.candidate_limit = limit;
        Ok(self)
    }

    /// Restricts the search to an area code.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningDomainError::InvalidAreaCode`] when the value is
    /// empty or contains non-digit characters.
    pub fn with_area_code(mut self, area_code: impl Into<String>) -> Result<Self, ProvisioningDomainError> {
        let raw = area_code.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(ProvisioningDomainError::InvalidAreaCode(raw));
        }
        self.area_code = Some(trimmed.to_owned());
        Ok(self)
    }

    /// Registers inbound callbacks on purchase.
    #[must_use]
    pub fn with_callbacks(mut self, callbacks: InboundCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Returns the country to search in.
    #[must_use]
    pub const fn country(&self) -> &CountryCode {
        &self.country
    }

    /// Returns whether candidates must be SMS-capable.
    #[must_use]
    pub const fn sms_required(&self) -> bool {
        self.sms_required
    }

    /// Returns the maximum number of candidates considered.
    #[must_use]
    pub const fn candidate_limit(&self) -> u32 {
        self.candidate_limit
    }

    /// Returns the optional area code filter.
    #[must_use]
    pub fn area_code(&self) -> Option<&str> {
        self.area_code.as_deref()
    }

    /// Returns the inbound callbacks registered on purchase.
    #[must_use]
    pub const fn callbacks(&self) -> &InboundCallbacks {
        &self.callbacks
    }
}

/// Renders the search criteria, for example `US sms area_code=415`.
impl fmt::Display for NumberPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.country)?;
        if self.sms_required {
            f.write_str(" sms")?;
        }
        if let Some(area_code) = &self.area_code {
            write!(f, " area_code={area_code}")?;
        }
        Ok(())
    }
}
