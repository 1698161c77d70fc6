//! Structured events emitted while a provisioning run progresses.

use super::{CompanyId, RunId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Step of a provisioning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStep {
    /// Claiming the per-company lease.
    AcquireLease,
    /// Extending the lease and confirming the run still holds it.
    RenewLease,
    /// Reading the company profile.
    LoadCompany,
    /// Allocating the agent configuration at the agent provider.
    AllocateAgent,
    /// Searching for and purchasing a telephony number.
    AcquireNumber,
    /// Inserting the agent record.
    PersistAgent,
    /// Writing the number onto the company profile.
    AttachNumber,
    /// Giving up the per-company lease.
    ReleaseLease,
}

impl ProvisioningStep {
    /// Returns the canonical name of the step.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AcquireLease => "acquire_lease",
            Self::RenewLease => "renew_lease",
            Self::LoadCompany => "load_company",
            Self::AllocateAgent => "allocate_agent",
            Self::AcquireNumber => "acquire_number",
            Self::PersistAgent => "persist_agent",
            Self::AttachNumber => "attach_number",
            Self::ReleaseLease => "release_lease",
        }
    }
}

impl fmt::Display for ProvisioningStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The step began.
    Started,
    /// The step completed.
    Succeeded,
    /// The step failed.
    Failed,
    /// The step's side effect was undone.
    Compensated,
    /// Undoing the step's side effect failed.
    CompensationFailed,
    /// The step's side effect was left behind for reconciliation.
    Orphaned,
}

impl EventOutcome {
    /// Returns the canonical name of the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Compensated => "compensated",
            Self::CompensationFailed => "compensation_failed",
            Self::Orphaned => "orphaned",
        }
    }
}

impl fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event describing progress of one step in one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningEvent {
    run_id: RunId,
    company_id: CompanyId,
    step: ProvisioningStep,
    outcome: EventOutcome,
    attributes: BTreeMap<&'static str, String>,
    occurred_at: DateTime<Utc>,
}

impl ProvisioningEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        run_id: RunId,
        company_id: CompanyId,
        step: ProvisioningStep,
        outcome: EventOutcome,
        clock: &impl Clock,
    ) -> Self {
        Self {
            run_id,
            company_id,
            step,
            outcome,
            attributes: BTreeMap::new(),
            occurred_at: clock.utc(),
        }
    }

    /// Adds an identifier or detail to the event.
    #[must_use]
    pub fn with_attribute(mut self, key: &'static str, value: impl ToString) -> Self {
        self.attributes.insert(key, value.to_string());
        self
    }

    /// Returns the run the event belongs to.
    #[must_use]
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Returns the company being provisioned.
    #[must_use]
    pub const fn company_id(&self) -> CompanyId {
        self.company_id
    }

    /// Returns the step the event describes.
    #[must_use]
    pub const fn step(&self) -> ProvisioningStep {
        self.step
    }

    /// Returns what happened to the step.
    #[must_use]
    pub const fn outcome(&self) -> EventOutcome {
        self.outcome
    }

    /// Returns the attribute stored under `key`.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Returns every attribute in key order.
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<&'static str, String> {
        &self.attributes
    }

    /// Returns when the event occurred.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
