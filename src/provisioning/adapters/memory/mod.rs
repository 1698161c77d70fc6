//! In-memory adapters for provisioning ports.
//!
//! These adapters model collaborator behaviour without network or database
//! access. Failure switches on each adapter let tests drive every saga path
//! deterministically.

mod agent_directory;
mod agent_provider;
mod company_directory;
mod events;
mod lease;
mod orphan_ledger;
mod telephony;

pub use agent_directory::InMemoryAgentDirectory;
pub use agent_provider::InMemoryAgentProvider;
pub use company_directory::InMemoryCompanyDirectory;
pub use events::RecordingEventSink;
pub use lease::InMemoryLeaseManager;
pub use orphan_ledger::InMemoryOrphanLedger;
pub use telephony::InMemoryTelephonyProvider;
