//! Tests for per-company leases and run serialization.

use super::support::{ACME_ID, ACME_NUMBER, Harness, ManualClock, company_id, number, us};
use crate::provisioning::{
    adapters::memory::{InMemoryAgentDirectory, InMemoryLeaseManager},
    domain::{
        AgentId, AgentRecord, CompanyId, EventOutcome, NewAgentRecord, ProvisioningStep, RunId,
    },
    ports::{
        AgentDirectory, AgentDirectoryResult, CompanyDirectory, CompanyLeaseManager, LeaseError,
    },
    services::{
        FaultClass, LeaseLoss, ProvisioningError, ProvisioningPorts, ProvisioningReceipt,
        ProvisioningRequest, ProvisioningResult, ProvisioningService,
    },
};
use async_trait::async_trait;
use chrono::TimeDelta;
use mockable::Clock;
use rstest::{fixture, rstest};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TTL: Duration = Duration::from_secs(120);

#[fixture]
fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}

// ── In-memory lease manager ────────────────────────────────────────

#[rstest]
#[tokio::test]
async fn lease_is_exclusive_until_it_expires(clock: Arc<ManualClock>) {
    let leases = InMemoryLeaseManager::new(Arc::clone(&clock));
    let first = RunId::new();
    let held = leases
        .try_acquire(company_id(7), first, TTL)
        .await
        .expect("first claim succeeds");
    assert_eq!(held.expires_at(), clock.utc() + TimeDelta::seconds(120));

    let contended = leases
        .try_acquire(company_id(7), RunId::new(), TTL)
        .await
        .expect_err("second claim is rejected");
    assert!(matches!(
        contended,
        LeaseError::Held { holder, .. } if holder == first
    ));

    clock.advance(TimeDelta::seconds(120));
    let successor = RunId::new();
    let taken_over = leases
        .try_acquire(company_id(7), successor, TTL)
        .await
        .expect("expired lease is taken over");
    assert_eq!(taken_over.holder(), successor);
}

#[rstest]
#[tokio::test]
async fn leases_are_per_company(clock: Arc<ManualClock>) {
    let leases = InMemoryLeaseManager::new(clock);
    leases
        .try_acquire(company_id(7), RunId::new(), TTL)
        .await
        .expect("claim company 7");
    leases
        .try_acquire(company_id(8), RunId::new(), TTL)
        .await
        .expect("claim company 8");
}

#[rstest]
#[tokio::test]
async fn releasing_a_superseded_lease_keeps_the_successor(clock: Arc<ManualClock>) {
    let leases = InMemoryLeaseManager::new(Arc::clone(&clock));
    let stale = leases
        .try_acquire(company_id(7), RunId::new(), TTL)
        .await
        .expect("first claim");
    clock.advance(TimeDelta::seconds(121));
    let successor = leases
        .try_acquire(company_id(7), RunId::new(), TTL)
        .await
        .expect("takeover");

    leases.release(&stale).await.expect("stale release is a no-op");

    let current = leases
        .current(company_id(7))
        .expect("inspect")
        .expect("successor still holds the lease");
    assert_eq!(current.holder(), successor.holder());
}

#[rstest]
#[tokio::test]
async fn zero_ttl_is_invalid(clock: Arc<ManualClock>) {
    let leases = InMemoryLeaseManager::new(clock);
    let err = leases
        .try_acquire(company_id(7), RunId::new(), Duration::ZERO)
        .await
        .expect_err("zero ttl");
    assert!(matches!(err, LeaseError::InvalidTtl(ttl) if ttl.is_zero()));
}

// ── Run serialization ──────────────────────────────────────────────

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_run_is_rejected_as_busy() {
    let harness = Harness::seeded();
    let holder = RunId::new();
    harness
        .leases
        .try_acquire(company_id(ACME_ID), holder, TTL)
        .await
        .expect("another run holds the company");

    let err = harness
        .service()
        .register(ProvisioningRequest::new(ACME_ID, "LoadBoard"))
        .await
        .expect_err("company is busy");

    assert!(matches!(
        err,
        ProvisioningError::Busy { holder: busy_holder, .. } if busy_holder == holder
    ));
    assert_eq!(err.status_code(), 409);
    assert_eq!(err.fault_class(), FaultClass::Conflict);
    assert_eq!(harness.agent_provider.allocate_calls().expect("inspect"), 0);
    assert_eq!(
        harness.events.outcomes_for(ProvisioningStep::AcquireLease),
        vec![EventOutcome::Started, EventOutcome::Failed]
    );
    assert!(harness.events.outcomes_for(ProvisioningStep::ReleaseLease).is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn expired_lease_of_a_crashed_run_is_superseded() {
    let harness = Harness::seeded();
    harness
        .leases
        .try_acquire(company_id(ACME_ID), RunId::new(), TTL)
        .await
        .expect("crashed run held the company");
    harness.clock.advance(TimeDelta::seconds(121));

    harness
        .service()
        .register(ProvisioningRequest::new(ACME_ID, "LoadBoard"))
        .await
        .expect("registration succeeds after expiry");
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simultaneous_runs_provision_at_most_once() {
    let harness = Harness::seeded();
    let service = harness.service();

    let (left, right) = tokio::join!(
        service.register(ProvisioningRequest::new(ACME_ID, "LoadBoard")),
        service.register(ProvisioningRequest::new(ACME_ID, "LoadBoard")),
    );

    let successes = [left.is_ok(), right.is_ok()]
        .iter()
        .filter(|ok| **ok)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(harness.telephony.purchased().expect("inspect").len(), 1);
}

// ── Runs that outlive their lease ──────────────────────────────────

const RIVAL_NUMBER: &str = "+14155550199";

/// What happens to the company while the first insert is stuck.
enum Interloper {
    /// A rival run provisions the company to completion.
    Run(ProvisioningService<ManualClock>),
    /// A rival run claims the lapsed lease and keeps it.
    Lease(Arc<InMemoryLeaseManager<ManualClock>>),
}

/// Agent directory whose first insert stalls past the lease lifetime.
struct StalledInsert {
    inner: Arc<InMemoryAgentDirectory>,
    clock: Arc<ManualClock>,
    interloper: Mutex<Option<Interloper>>,
    rival_outcome: Mutex<Option<ProvisioningResult<ProvisioningReceipt>>>,
}

impl StalledInsert {
    fn new(harness: &Harness) -> Arc<Self> {
        Arc::new(Self {
            inner: Arc::clone(&harness.agents),
            clock: Arc::clone(&harness.clock),
            interloper: Mutex::new(None),
            rival_outcome: Mutex::new(None),
        })
    }

    fn arm(&self, interloper: Interloper) {
        *self.interloper.lock().expect("interloper lock") = Some(interloper);
    }

    fn rival_outcome(&self) -> Option<ProvisioningResult<ProvisioningReceipt>> {
        self.rival_outcome.lock().expect("outcome lock").take()
    }
}

#[async_trait]
impl AgentDirectory for StalledInsert {
    async fn insert(&self, record: &NewAgentRecord) -> AgentDirectoryResult<AgentRecord> {
        let interloper = self.interloper.lock().expect("interloper lock").take();
        if let Some(interloper) = interloper {
            self.clock.advance(TimeDelta::seconds(121));
            match interloper {
                Interloper::Run(rival) => {
                    let outcome = rival
                        .register(ProvisioningRequest::new(ACME_ID, "LoadBoard"))
                        .await;
                    *self.rival_outcome.lock().expect("outcome lock") = Some(outcome);
                }
                Interloper::Lease(leases) => {
                    leases
                        .try_acquire(company_id(ACME_ID), RunId::new(), TTL)
                        .await
                        .expect("rival claims the lapsed lease");
                }
            }
        }
        self.inner.insert(record).await
    }

    async fn delete(&self, id: AgentId) -> AgentDirectoryResult<()> {
        self.inner.delete(id).await
    }

    async fn find_by_company(
        &self,
        company_id: CompanyId,
    ) -> AgentDirectoryResult<Vec<AgentRecord>> {
        self.inner.find_by_company(company_id).await
    }
}

fn stalled_ports(harness: &Harness, agents: &Arc<StalledInsert>) -> ProvisioningPorts {
    ProvisioningPorts {
        agents: agents.clone(),
        ..harness.ports()
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn run_overtaken_while_stalled_unwinds_instead_of_overwriting() {
    let harness = Harness::seeded();
    harness
        .telephony
        .add_available(number(RIVAL_NUMBER), us(), true)
        .expect("seed inventory");
    let agents = StalledInsert::new(&harness);
    let ports = stalled_ports(&harness, &agents);
    let settings = super::support::default_settings();
    agents.arm(Interloper::Run(ProvisioningService::new(
        ports.clone(),
        settings.clone(),
        Arc::clone(&harness.clock),
    )));
    let service = ProvisioningService::new(ports, settings, Arc::clone(&harness.clock));

    let err = service
        .register(ProvisioningRequest::new(ACME_ID, "LoadBoard"))
        .await
        .expect_err("overtaken run does not attach its number");

    let rival = agents
        .rival_outcome()
        .expect("rival ran")
        .expect("rival provisions the company");
    assert_eq!(rival.telephony_number, number(RIVAL_NUMBER));
    assert!(matches!(
        err,
        ProvisioningError::LeaseLost {
            source: LeaseLoss::CompanyChanged { expected: None, found: Some(ref found) },
            ..
        } if *found == number(RIVAL_NUMBER)
    ));
    assert_eq!(err.status_code(), 409);
    assert!(err.orphans().is_empty());

    let company = harness
        .companies
        .find_by_id(company_id(ACME_ID))
        .await
        .expect("lookup succeeds")
        .expect("company exists");
    assert_eq!(company.telephony_number(), Some(&number(RIVAL_NUMBER)));
    let records = harness
        .agents
        .find_by_company(company_id(ACME_ID))
        .await
        .expect("lookup succeeds");
    assert_eq!(records.len(), 1);
    assert_eq!(
        harness.telephony.purchased().expect("inspect"),
        vec![number(RIVAL_NUMBER)]
    );
    assert_eq!(
        harness.telephony.released().expect("inspect"),
        vec![number(ACME_NUMBER)]
    );
    assert_eq!(harness.agent_provider.live_allocations().expect("inspect"), 1);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn lost_lease_stops_the_run_before_attaching() {
    let harness = Harness::seeded();
    let agents = StalledInsert::new(&harness);
    agents.arm(Interloper::Lease(Arc::clone(&harness.leases)));
    let service = ProvisioningService::new(
        stalled_ports(&harness, &agents),
        super::support::default_settings(),
        Arc::clone(&harness.clock),
    );

    let err = service
        .register(ProvisioningRequest::new(ACME_ID, "LoadBoard"))
        .await
        .expect_err("run without its lease does not attach");

    assert!(matches!(
        err,
        ProvisioningError::LeaseLost {
            source: LeaseLoss::Renewal(LeaseError::Held { .. }),
            ..
        }
    ));
    assert_eq!(err.fault_class(), FaultClass::Conflict);
    let company = harness
        .companies
        .find_by_id(company_id(ACME_ID))
        .await
        .expect("lookup succeeds")
        .expect("company exists");
    assert_eq!(company.telephony_number(), None);
    assert!(
        harness
            .agents
            .find_by_company(company_id(ACME_ID))
            .await
            .expect("lookup succeeds")
            .is_empty()
    );
    assert_eq!(
        harness.telephony.released().expect("inspect"),
        vec![number(ACME_NUMBER)]
    );
    assert_eq!(harness.agent_provider.live_allocations().expect("inspect"), 0);
    assert_eq!(
        harness.events.outcomes_for(ProvisioningStep::RenewLease),
        vec![
            EventOutcome::Succeeded,
            EventOutcome::Succeeded,
            EventOutcome::Failed
        ]
    );
    assert!(
        harness
            .events
            .outcomes_for(ProvisioningStep::AttachNumber)
            .is_empty()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn renewals_keep_a_slow_run_ahead_of_its_lease() {
    let harness = Harness::seeded();
    let service = harness.service();

    service
        .register(ProvisioningRequest::new(ACME_ID, "LoadBoard"))
        .await
        .expect("registration succeeds");

    let renewed: Vec<_> = harness
        .events
        .with_outcome(EventOutcome::Succeeded)
        .into_iter()
        .filter(|event| event.step() == ProvisioningStep::RenewLease)
        .collect();
    assert_eq!(renewed.len(), 3);
    let expected = (harness.clock.utc() + TimeDelta::seconds(120)).to_string();
    assert!(
        renewed
            .iter()
            .all(|event| event.attribute("expires_at") == Some(expected.as_str()))
    );
}
