//! `PostgreSQL` adapters for company, agent, lease and orphan persistence.

mod agent_directory;
mod blocking;
mod company_directory;
mod lease;
mod models;
mod orphan_ledger;
mod schema;

pub use agent_directory::PostgresAgentDirectory;
pub use blocking::{BlockingFailure, ProvisioningPgPool, StatementTimeout, build_pool};
pub use company_directory::PostgresCompanyDirectory;
pub use lease::PostgresLeaseManager;
pub use orphan_ledger::PostgresOrphanLedger;
