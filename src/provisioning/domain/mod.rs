//! Domain model for agent provisioning.
//!
//! The provisioning domain covers companies, agent records, telephony numbers
//! and the bookkeeping types of a provisioning run (leases, orphaned
//! resources, step events). Infrastructure concerns stay outside the domain
//! boundary.

mod agent;
mod agent_type;
mod company;
mod error;
mod event;
mod ids;
mod lease;
mod number;
mod orphan;

pub use agent::{AgentBlueprint, AgentConfig, AgentRecord, NewAgentRecord, PersistedAgentData};
pub use agent_type::AgentType;
pub use company::{CompanyName, CompanyProfile};
pub use error::{ParseAgentTypeError, ProvisioningDomainError};
pub use event::{EventOutcome, ProvisioningEvent, ProvisioningStep};
pub use ids::{AgentId, CompanyId, OrphanId, ProviderAgentId, RunId};
pub use lease::CompanyLease;
pub use number::{CountryCode, InboundCallbacks, NumberPolicy, TelephonyNumber};
pub use orphan::{OrphanKind, OrphanedResource, PersistedOrphanData};
