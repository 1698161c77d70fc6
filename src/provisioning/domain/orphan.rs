//! Externally acquired resources left without a local owner.

use super::{
    AgentId, CompanyId, OrphanId, ProviderAgentId, ProvisioningDomainError, RunId,
    TelephonyNumber,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource that a failed or cancelled run could not undo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reference", rename_all = "snake_case")]
pub enum OrphanKind {
    /// Agent configuration still allocated at the agent provider.
    AgentConfiguration(ProviderAgentId),
    /// Purchased number still billed by the telephony provider.
    TelephonyNumber(TelephonyNumber),
    /// Agent record whose number was released or never attached.
    AgentRecord(AgentId),
    /// Allocation that did not answer in time; the provider may or may not
    /// hold a configuration under this display name.
    UnconfirmedAgentConfiguration(String),
    /// Purchase that did not answer in time; the provider may or may not
    /// have sold a number matching these search criteria.
    UnconfirmedTelephonyNumber(String),
}

impl OrphanKind {
    /// Returns the canonical storage name of the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AgentConfiguration(_) => "agent_configuration",
            Self::TelephonyNumber(_) => "telephony_number",
            Self::AgentRecord(_) => "agent_record",
            Self::UnconfirmedAgentConfiguration(_) => "unconfirmed_agent_configuration",
            Self::UnconfirmedTelephonyNumber(_) => "unconfirmed_telephony_number",
        }
    }

    /// Returns `true` when the provider never confirmed the resource exists,
    /// so there is no identifier to release.
    #[must_use]
    pub const fn is_unconfirmed(&self) -> bool {
        matches!(
            self,
            Self::UnconfirmedAgentConfiguration(_) | Self::UnconfirmedTelephonyNumber(_)
        )
    }

    /// Returns the external reference of the resource as text.
    #[must_use]
    pub fn reference(&self) -> String {
        match self {
            Self::AgentConfiguration(id) => id.to_string(),
            Self::TelephonyNumber(number) => number.to_string(),
            Self::AgentRecord(id) => id.to_string(),
            Self::UnconfirmedAgentConfiguration(criteria)
            | Self::UnconfirmedTelephonyNumber(criteria) => criteria.clone(),
        }
    }

    /// Rebuilds a kind from its storage name and reference text.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningDomainError::UnknownOrphanKind`] for an
    /// unrecognised name and
    /// [`ProvisioningDomainError::InvalidOrphanReference`] when the reference
    /// does not parse for the kind.
    pub fn from_parts(kind: &str, reference: &str) -> Result<Self, ProvisioningDomainError> {
        let invalid = || ProvisioningDomainError::InvalidOrphanReference {
            kind: kind.to_owned(),
            reference: reference.to_owned(),
        };
        match kind {
            "agent_configuration" => ProviderAgentId::new(reference)
                .map(Self::AgentConfiguration)
                .map_err(|_| invalid()),
            "telephony_number" => TelephonyNumber::new(reference)
                .map(Self::TelephonyNumber)
                .map_err(|_| invalid()),
            "agent_record" => reference
                .parse::<i64>()
                .ok()
                .and_then(|raw| AgentId::new(raw).ok())
                .map(Self::AgentRecord)
                .ok_or_else(invalid),
            "unconfirmed_agent_configuration" | "unconfirmed_telephony_number"
                if reference.trim().is_empty() =>
            {
                Err(invalid())
            }
            "unconfirmed_agent_configuration" => {
                Ok(Self::UnconfirmedAgentConfiguration(reference.to_owned()))
            }
            "unconfirmed_telephony_number" => {
                Ok(Self::UnconfirmedTelephonyNumber(reference.to_owned()))
            }
            other => Err(ProvisioningDomainError::UnknownOrphanKind(other.to_owned())),
        }
    }
}

impl fmt::Display for OrphanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_str(), self.reference())
    }
}

/// Orphan ledger entry awaiting reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanedResource {
    id: OrphanId,
    run_id: RunId,
    company_id: CompanyId,
    kind: OrphanKind,
    reason: String,
    recorded_at: DateTime<Utc>,
    resolved_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted orphan entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedOrphanData {
    /// Ledger entry identifier.
    pub id: OrphanId,
    /// Run that acquired the resource.
    pub run_id: RunId,
    /// Company the resource was acquired for.
    pub company_id: CompanyId,
    /// Orphaned resource.
    pub kind: OrphanKind,
    /// Why the resource could not be undone.
    pub reason: String,
    /// When the orphan was recorded.
    pub recorded_at: DateTime<Utc>,
    /// When an operator reconciled the orphan.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl OrphanedResource {
    /// Records a new unresolved orphan.
    #[must_use]
    pub fn new(
        run_id: RunId,
        company_id: CompanyId,
        kind: OrphanKind,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        Self {
            id: OrphanId::new(),
            run_id,
            company_id,
            kind,
            reason: reason.into(),
            recorded_at: clock.utc(),
            resolved_at: None,
        }
    }

    /// Reconstructs an entry from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedOrphanData) -> Self {
        Self {
            id: data.id,
            run_id: data.run_id,
            company_id: data.company_id,
            kind: data.kind,
            reason: data.reason,
            recorded_at: data.recorded_at,
            resolved_at: data.resolved_at,
        }
    }

    /// Returns the ledger entry identifier.
    #[must_use]
    pub const fn id(&self) -> OrphanId {
        self.id
    }

    /// Returns the run that acquired the resource.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the company the resource was acquired for.
    #[must_use]
    pub const fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// Returns the orphaned resource.
    #[must_use]
    pub const fn kind(&self) -> &OrphanKind {
        &self.kind
    }

    /// Returns why the resource could not be undone.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns when the orphan was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Returns when the orphan was reconciled, if it has been.
    #[must_use]
    pub const fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    /// Returns `true` once an operator has reconciled the orphan.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    /// Marks the orphan as reconciled.
    pub fn resolve(&mut self, clock: &impl Clock) {
        self.resolved_at = Some(clock.utc());
    }
}
