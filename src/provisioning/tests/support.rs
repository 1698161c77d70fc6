//! Shared fixtures for provisioning service tests.

use crate::provisioning::{
    adapters::memory::{
        InMemoryAgentDirectory, InMemoryAgentProvider, InMemoryCompanyDirectory,
        InMemoryLeaseManager, InMemoryOrphanLedger, InMemoryTelephonyProvider,
        RecordingEventSink,
    },
    domain::{
        CompanyId, CompanyName, CompanyProfile, CountryCode, NumberPolicy, TelephonyNumber,
    },
    services::{
        ProvisioningPorts, ProvisioningService, ProvisioningSettings, ReconciliationService,
    },
};
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use std::sync::{Arc, Mutex};

pub(super) const ACME_ID: i64 = 7;
pub(super) const ACME_NAME: &str = "Acme Freight";
pub(super) const ACME_NUMBER: &str = "+14155550100";

/// Clock that only moves when a test advances it.
#[derive(Debug)]
pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 10, 19, 9, 0, 0)
            .single()
            .expect("valid start time");
        Self {
            now: Mutex::new(start),
        }
    }

    pub(super) fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

pub(super) fn company_id(raw: i64) -> CompanyId {
    CompanyId::new(raw).expect("valid company id")
}

pub(super) fn number(raw: &str) -> TelephonyNumber {
    TelephonyNumber::new(raw).expect("valid number")
}

pub(super) fn us() -> CountryCode {
    CountryCode::new("US").expect("valid country")
}

pub(super) fn default_settings() -> ProvisioningSettings {
    ProvisioningSettings::new(NumberPolicy::new(us()))
}

/// In-memory collaborators seeded with Acme Freight and one SMS number.
pub(super) struct Harness {
    pub(super) companies: Arc<InMemoryCompanyDirectory>,
    pub(super) agents: Arc<InMemoryAgentDirectory>,
    pub(super) agent_provider: Arc<InMemoryAgentProvider>,
    pub(super) telephony: Arc<InMemoryTelephonyProvider>,
    pub(super) leases: Arc<InMemoryLeaseManager<ManualClock>>,
    pub(super) orphans: Arc<InMemoryOrphanLedger>,
    pub(super) events: Arc<RecordingEventSink>,
    pub(super) clock: Arc<ManualClock>,
}

impl Harness {
    pub(super) fn seeded() -> Self {
        let clock = Arc::new(ManualClock::new());
        let harness = Self {
            companies: Arc::new(InMemoryCompanyDirectory::new()),
            agents: Arc::new(InMemoryAgentDirectory::new()),
            agent_provider: Arc::new(InMemoryAgentProvider::new()),
            telephony: Arc::new(InMemoryTelephonyProvider::new()),
            leases: Arc::new(InMemoryLeaseManager::new(Arc::clone(&clock))),
            orphans: Arc::new(InMemoryOrphanLedger::new()),
            events: Arc::new(RecordingEventSink::new()),
            clock,
        };
        harness
            .companies
            .insert_company(CompanyProfile::new(
                company_id(ACME_ID),
                CompanyName::new(ACME_NAME).expect("valid name"),
            ))
            .expect("seed company");
        harness
            .telephony
            .add_available(number(ACME_NUMBER), us(), true)
            .expect("seed inventory");
        harness
    }

    pub(super) fn ports(&self) -> ProvisioningPorts {
        ProvisioningPorts {
            companies: self.companies.clone(),
            agents: self.agents.clone(),
            agent_provider: self.agent_provider.clone(),
            telephony: self.telephony.clone(),
            leases: self.leases.clone(),
            orphans: self.orphans.clone(),
            events: self.events.clone(),
        }
    }

    pub(super) fn service(&self) -> ProvisioningService<ManualClock> {
        self.service_with(default_settings())
    }

    pub(super) fn service_with(
        &self,
        settings: ProvisioningSettings,
    ) -> ProvisioningService<ManualClock> {
        ProvisioningService::new(self.ports(), settings, Arc::clone(&self.clock))
    }

    pub(super) fn reconciliation(&self) -> ReconciliationService<ManualClock> {
        ReconciliationService::new(&self.ports(), Arc::clone(&self.clock))
    }
}
