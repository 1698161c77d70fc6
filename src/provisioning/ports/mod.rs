//! Port contracts for agent provisioning.
//!
//! Ports define infrastructure-agnostic interfaces for every collaborator of
//! a provisioning run: the two directories, the two remote providers, the
//! per-company lease manager, the orphan ledger and the event sink.

pub mod agent_directory;
pub mod agent_provider;
pub mod company_directory;
pub mod events;
pub mod lease;
pub mod orphan_ledger;
pub mod telephony;

pub use agent_directory::{AgentDirectory, AgentDirectoryError, AgentDirectoryResult};
pub use agent_provider::{AgentProvider, AgentProviderError, AgentProviderResult};
pub use company_directory::{CompanyDirectory, CompanyDirectoryError, CompanyDirectoryResult};
pub use events::ProvisioningEventSink;
pub use lease::{CompanyLeaseManager, LeaseError, LeaseResult};
pub use orphan_ledger::{OrphanLedger, OrphanLedgerError, OrphanLedgerResult};
pub use telephony::{TelephonyError, TelephonyProvider, TelephonyResult};
