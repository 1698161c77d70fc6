//! Error types for provisioning domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing provisioning domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisioningDomainError {
    /// The company identifier is not a positive integer.
    #[error("invalid company identifier {0}, expected a positive integer")]
    InvalidCompanyId(i64),

    /// The agent identifier is not a positive integer.
    #[error("invalid agent identifier {0}, expected a positive integer")]
    InvalidAgentId(i64),

    /// The company display name is empty after trimming.
    #[error("company name must not be empty")]
    EmptyCompanyName,

    /// The provider-issued agent identifier is empty after trimming.
    #[error("provider agent identifier must not be empty")]
    EmptyProviderAgentId,

    /// The telephony number is not in E.164 format.
    #[error("invalid telephony number '{0}', expected E.164 format")]
    InvalidTelephonyNumber(String),

    /// The country code is not an ISO 3166-1 alpha-2 code.
    #[error("invalid country code '{0}', expected two ASCII letters")]
    InvalidCountryCode(String),

    /// The area code contains non-digit characters.
    #[error("invalid area code '{0}', expected digits only")]
    InvalidAreaCode(String),

    /// The number search candidate limit is out of range.
    #[error("candidate limit {0} is out of range (1..=50)")]
    InvalidCandidateLimit(u32),

    /// A stored orphan kind is not recognised.
    #[error("unknown orphan kind '{0}'")]
    UnknownOrphanKind(String),

    /// A stored orphan reference does not parse for its kind.
    #[error("invalid {kind} reference '{reference}'")]
    InvalidOrphanReference {
        /// Storage name of the kind.
        kind: String,
        /// Stored reference text.
        reference: String,
    },

    /// The agent prompt template failed to render.
    #[error("failed to render agent prompt: {0}")]
    PromptRender(String),
}

/// Error returned while parsing agent types from requests or persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unsupported agent type: {0}")]
pub struct ParseAgentTypeError(pub String);
