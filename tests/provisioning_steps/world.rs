//! Shared world state for provisioning BDD scenarios.

use std::sync::Arc;

use agentline::provisioning::{
    adapters::memory::{
        InMemoryAgentDirectory, InMemoryAgentProvider, InMemoryCompanyDirectory,
        InMemoryLeaseManager, InMemoryOrphanLedger, InMemoryTelephonyProvider,
        RecordingEventSink,
    },
    domain::{CountryCode, NumberPolicy},
    services::{
        ProvisioningError, ProvisioningPorts, ProvisioningReceipt, ProvisioningService,
        ProvisioningSettings, ReconciliationService,
    },
};
use mockable::DefaultClock;
use rstest::fixture;

/// Scenario world for provisioning behaviour tests.
pub struct ProvisioningWorld {
    /// Company directory seeded by given steps.
    pub companies: Arc<InMemoryCompanyDirectory>,
    /// Agent directory.
    pub agents: Arc<InMemoryAgentDirectory>,
    /// Agent provider double.
    pub agent_provider: Arc<InMemoryAgentProvider>,
    /// Telephony provider double.
    pub telephony: Arc<InMemoryTelephonyProvider>,
    /// Orphan ledger.
    pub orphans: Arc<InMemoryOrphanLedger>,
    /// Ports shared by the services under test.
    pub ports: ProvisioningPorts,
    /// Result of the last registration attempt.
    pub last_result: Option<Result<ProvisioningReceipt, ProvisioningError>>,
}

impl ProvisioningWorld {
    /// Creates a world with empty collaborators.
    #[must_use]
    pub fn new() -> Self {
        let clock = Arc::new(DefaultClock);
        let companies = Arc::new(InMemoryCompanyDirectory::new());
        let agents = Arc::new(InMemoryAgentDirectory::new());
        let agent_provider = Arc::new(InMemoryAgentProvider::new());
        let telephony = Arc::new(InMemoryTelephonyProvider::new());
        let orphans = Arc::new(InMemoryOrphanLedger::new());
        let ports = ProvisioningPorts {
            companies: companies.clone(),
            agents: agents.clone(),
            agent_provider: agent_provider.clone(),
            telephony: telephony.clone(),
            leases: Arc::new(InMemoryLeaseManager::new(clock)),
            orphans: orphans.clone(),
            events: Arc::new(RecordingEventSink::new()),
        };
        Self {
            companies,
            agents,
            agent_provider,
            telephony,
            orphans,
            ports,
            last_result: None,
        }
    }

    /// Builds the provisioning service for US numbers.
    pub fn service(&self) -> Result<ProvisioningService<DefaultClock>, eyre::Report> {
        let country = CountryCode::new("US")?;
        Ok(ProvisioningService::new(
            self.ports.clone(),
            ProvisioningSettings::new(NumberPolicy::new(country)),
            Arc::new(DefaultClock),
        ))
    }

    /// Builds the reconciliation service.
    #[must_use]
    pub fn reconciliation(&self) -> ReconciliationService<DefaultClock> {
        ReconciliationService::new(&self.ports, Arc::new(DefaultClock))
    }

    /// Returns the last registration result.
    pub fn last_result(&self) -> Result<&Result<ProvisioningReceipt, ProvisioningError>, eyre::Report> {
        self.last_result
            .as_ref()
            .ok_or_else(|| eyre::eyre!("no registration attempted in scenario world"))
    }
}

impl Default for ProvisioningWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> ProvisioningWorld {
    ProvisioningWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
