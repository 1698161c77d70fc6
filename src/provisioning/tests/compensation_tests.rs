//! Service tests for failure handling after external side effects.

use super::support::{ACME_ID, ACME_NUMBER, Harness, company_id, default_settings, number};
use crate::provisioning::{
    domain::{
        AgentId, CountryCode, EventOutcome, NumberPolicy, OrphanKind, ProviderAgentId,
        ProvisioningStep,
    },
    ports::{AgentDirectory, AgentProviderError, CompanyDirectory, TelephonyError},
    services::{
        CompensationPolicy, PersistenceFailure, ProvisioningError, ProvisioningRequest,
        ProvisioningSettings,
    },
};
use rstest::{fixture, rstest};
use std::time::Duration;

#[fixture]
fn harness() -> Harness {
    Harness::seeded()
}

fn acme_request() -> ProvisioningRequest {
    ProvisioningRequest::new(ACME_ID, "LoadBoard")
}

fn first_agent() -> ProviderAgentId {
    ProviderAgentId::new("agent-1").expect("valid id")
}

fn compensated_steps(harness: &Harness) -> Vec<ProvisioningStep> {
    harness
        .events
        .with_outcome(EventOutcome::Compensated)
        .iter()
        .map(|event| event.step())
        .collect()
}

async fn assert_nothing_persisted(harness: &Harness) {
    let records = harness
        .agents
        .find_by_company(company_id(ACME_ID))
        .await
        .expect("lookup succeeds");
    assert!(records.is_empty(), "unexpected records: {records:?}");
    let company = harness
        .companies
        .find_by_id(company_id(ACME_ID))
        .await
        .expect("lookup succeeds")
        .expect("company exists");
    assert_eq!(company.telephony_number(), None);
}

// ── Provider failures ──────────────────────────────────────────────

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn missing_agent_configuration_stops_before_number_purchase(harness: Harness) {
    harness
        .agent_provider
        .set_withhold_configuration(true)
        .expect("configure provider");

    let err = harness
        .service()
        .register(acme_request())
        .await
        .expect_err("allocation fails");

    assert!(matches!(
        err,
        ProvisioningError::AgentAllocation {
            source: AgentProviderError::NoConfiguration,
            ..
        }
    ));
    assert_eq!(err.status_code(), 502);
    assert_eq!(harness.telephony.acquire_calls().expect("inspect"), 0);
    assert!(compensated_steps(&harness).is_empty());
    assert!(harness.orphans.entries().expect("inspect").is_empty());
    assert_nothing_persisted(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn no_number_available_releases_the_agent_configuration(harness: Harness) {
    let elsewhere = NumberPolicy::new(CountryCode::new("GB").expect("valid country"));
    let err = harness
        .service_with(ProvisioningSettings::new(elsewhere))
        .register(acme_request())
        .await
        .expect_err("no number in GB inventory");

    assert!(matches!(
        err,
        ProvisioningError::NumberAcquisition {
            source: TelephonyError::NoNumberAvailable { ref country },
            ..
        } if country == "GB"
    ));
    assert_eq!(err.status_code(), 502);
    assert!(err.orphans().is_empty());
    assert_eq!(
        harness.agent_provider.released().expect("inspect"),
        vec![first_agent()]
    );
    assert_eq!(harness.agent_provider.live_allocations().expect("inspect"), 0);
    assert_eq!(compensated_steps(&harness), vec![ProvisioningStep::AllocateAgent]);
    assert_nothing_persisted(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn declined_purchase_releases_the_agent_configuration(harness: Harness) {
    harness
        .telephony
        .set_fail_purchases(true)
        .expect("configure telephony");

    let err = harness
        .service()
        .register(acme_request())
        .await
        .expect_err("purchase fails");

    assert!(matches!(
        err,
        ProvisioningError::NumberAcquisition {
            source: TelephonyError::PurchaseFailed { .. },
            ..
        }
    ));
    assert_eq!(harness.agent_provider.live_allocations().expect("inspect"), 0);
    assert!(harness.telephony.purchased().expect("inspect").is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stalled_purchase_is_recorded_as_unconfirmed_and_unwinds(harness: Harness) {
    harness
        .telephony
        .set_stall_purchases(true)
        .expect("configure telephony");
    let settings = default_settings().with_step_timeout(Duration::from_millis(50));

    let err = harness
        .service_with(settings)
        .register(acme_request())
        .await
        .expect_err("purchase times out");

    assert!(matches!(
        err,
        ProvisioningError::NumberAcquisition {
            source: TelephonyError::TimedOut(after),
            ..
        } if after == Duration::from_millis(50)
    ));
    assert_eq!(
        harness.agent_provider.released().expect("inspect"),
        vec![first_agent()]
    );

    // The provider may still complete the purchase, so the attempt is kept
    // for an operator to check.
    let unconfirmed = OrphanKind::UnconfirmedTelephonyNumber("US sms".to_owned());
    let [orphan] = err.orphans() else {
        panic!("expected one orphan, got {:?}", err.orphans());
    };
    assert_eq!(orphan.kind(), &unconfirmed);
    assert_eq!(orphan.company_id(), company_id(ACME_ID));
    let ledger = harness.orphans.entries().expect("inspect");
    assert_eq!(
        ledger.iter().map(|entry| entry.kind().clone()).collect::<Vec<_>>(),
        vec![unconfirmed]
    );
    let orphaned = harness.events.with_outcome(EventOutcome::Orphaned);
    let [event] = orphaned.as_slice() else {
        panic!("expected one orphaned event, got {orphaned:?}");
    };
    assert_eq!(event.step(), ProvisioningStep::AcquireNumber);
    assert_eq!(
        event.attribute("resource"),
        Some("unconfirmed_telephony_number US sms")
    );
    assert_eq!(
        harness.events.outcomes_for(ProvisioningStep::ReleaseLease),
        vec![EventOutcome::Succeeded]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stalled_allocation_is_recorded_as_unconfirmed(harness: Harness) {
    harness
        .agent_provider
        .set_stall_allocations(true)
        .expect("configure provider");
    let settings = default_settings().with_step_timeout(Duration::from_millis(50));

    let err = harness
        .service_with(settings)
        .register(acme_request())
        .await
        .expect_err("allocation times out");

    assert!(matches!(
        err,
        ProvisioningError::AgentAllocation {
            source: AgentProviderError::TimedOut(_),
            ..
        }
    ));
    assert_eq!(err.status_code(), 502);
    let [orphan] = err.orphans() else {
        panic!("expected one orphan, got {:?}", err.orphans());
    };
    assert_eq!(
        orphan.kind(),
        &OrphanKind::UnconfirmedAgentConfiguration("Acme Freight Load Board".to_owned())
    );
    assert_eq!(harness.orphans.entries().expect("inspect").len(), 1);
    assert_eq!(harness.telephony.acquire_calls().expect("inspect"), 0);
    assert_nothing_persisted(&harness).await;
}

// ── Directory failures ─────────────────────────────────────────────

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_agent_insert_releases_number_then_agent(harness: Harness) {
    harness
        .agents
        .set_fail_inserts(true)
        .expect("configure directory");

    let err = harness
        .service()
        .register(acme_request())
        .await
        .expect_err("insert fails");

    assert!(matches!(
        err,
        ProvisioningError::Persistence {
            step: ProvisioningStep::PersistAgent,
            source: PersistenceFailure::Agents(_),
            ..
        }
    ));
    assert_eq!(err.status_code(), 500);
    assert!(err.orphans().is_empty());
    assert_eq!(
        compensated_steps(&harness),
        vec![ProvisioningStep::AcquireNumber, ProvisioningStep::AllocateAgent]
    );
    assert_eq!(
        harness.telephony.released().expect("inspect"),
        vec![number(ACME_NUMBER)]
    );
    assert_eq!(
        harness.agent_provider.released().expect("inspect"),
        vec![first_agent()]
    );
    assert_nothing_persisted(&harness).await;
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_number_attach_unwinds_in_reverse_order(harness: Harness) {
    harness
        .companies
        .set_fail_updates(true)
        .expect("configure directory");

    let err = harness
        .service()
        .register(acme_request())
        .await
        .expect_err("attach fails");

    assert!(matches!(
        err,
        ProvisioningError::Persistence {
            step: ProvisioningStep::AttachNumber,
            source: PersistenceFailure::Companies(_),
            ..
        }
    ));
    assert_eq!(
        compensated_steps(&harness),
        vec![
            ProvisioningStep::PersistAgent,
            ProvisioningStep::AcquireNumber,
            ProvisioningStep::AllocateAgent,
        ]
    );
    assert!(harness.orphans.entries().expect("inspect").is_empty());
    assert_nothing_persisted(&harness).await;
}

// ── Compensation failures ──────────────────────────────────────────

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_number_release_is_recorded_as_an_orphan(harness: Harness) {
    harness
        .agents
        .set_fail_inserts(true)
        .expect("configure directory");
    harness
        .telephony
        .set_fail_releases(true)
        .expect("configure telephony");

    let err = harness
        .service()
        .register(acme_request())
        .await
        .expect_err("insert fails");

    let [orphan] = err.orphans() else {
        panic!("expected one orphan, got {:?}", err.orphans());
    };
    assert_eq!(
        orphan.kind(),
        &OrphanKind::TelephonyNumber(number(ACME_NUMBER))
    );
    assert_eq!(orphan.company_id(), company_id(ACME_ID));
    assert!(orphan.reason().contains("503"));
    assert_eq!(
        harness.orphans.entries().expect("inspect"),
        vec![orphan.clone()]
    );

    let failed = harness.events.with_outcome(EventOutcome::CompensationFailed);
    assert_eq!(failed.len(), 1);
    let orphaned = harness.events.with_outcome(EventOutcome::Orphaned);
    let [event] = orphaned.as_slice() else {
        panic!("expected one orphaned event, got {orphaned:?}");
    };
    assert_eq!(event.step(), ProvisioningStep::AcquireNumber);
    assert_eq!(event.attribute("orphan_id"), Some(orphan.id().to_string().as_str()));

    // Later compensations still run after one fails.
    assert_eq!(
        harness.agent_provider.released().expect("inspect"),
        vec![first_agent()]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_record_delete_leaves_an_agent_record_orphan(harness: Harness) {
    harness
        .companies
        .set_fail_updates(true)
        .expect("configure directory");
    harness
        .agents
        .set_fail_deletes(true)
        .expect("configure directory");

    let err = harness
        .service()
        .register(acme_request())
        .await
        .expect_err("attach fails");

    let kinds: Vec<_> = err.orphans().iter().map(|orphan| orphan.kind().clone()).collect();
    assert_eq!(
        kinds,
        vec![OrphanKind::AgentRecord(AgentId::new(1).expect("valid id"))]
    );
    assert_eq!(
        compensated_steps(&harness),
        vec![ProvisioningStep::AcquireNumber, ProvisioningStep::AllocateAgent]
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn disabled_number_release_keeps_the_number_as_an_orphan(harness: Harness) {
    harness
        .agents
        .set_fail_inserts(true)
        .expect("configure directory");
    let settings = default_settings().with_compensation(CompensationPolicy {
        release_numbers: false,
        release_agent_configurations: true,
    });

    let err = harness
        .service_with(settings)
        .register(acme_request())
        .await
        .expect_err("insert fails");

    let [orphan] = err.orphans() else {
        panic!("expected one orphan, got {:?}", err.orphans());
    };
    assert_eq!(orphan.reason(), "automatic compensation disabled by policy");
    assert!(harness.telephony.released().expect("inspect").is_empty());
    assert_eq!(
        harness.telephony.purchased().expect("inspect"),
        vec![number(ACME_NUMBER)]
    );
    assert!(
        harness
            .events
            .with_outcome(EventOutcome::CompensationFailed)
            .is_empty()
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ledger_outage_still_surfaces_the_orphan(harness: Harness) {
    harness
        .agents
        .set_fail_inserts(true)
        .expect("configure directory");
    harness
        .telephony
        .set_fail_releases(true)
        .expect("configure telephony");
    harness
        .orphans
        .set_fail_records(true)
        .expect("configure ledger");

    let err = harness
        .service()
        .register(acme_request())
        .await
        .expect_err("insert fails");

    assert_eq!(err.orphans().len(), 1);
    assert!(harness.orphans.entries().expect("inspect").is_empty());
    let orphaned = harness.events.with_outcome(EventOutcome::Orphaned);
    let [event] = orphaned.as_slice() else {
        panic!("expected one orphaned event, got {orphaned:?}");
    };
    assert!(event.attribute("ledger_error").is_some());
}

// ── Cancellation ───────────────────────────────────────────────────

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn cancelled_run_reports_outstanding_resources(harness: Harness) {
    harness
        .telephony
        .set_stall_purchases(true)
        .expect("configure telephony");
    let service = harness.service();

    let outcome =
        tokio::time::timeout(Duration::from_millis(50), service.register(acme_request())).await;
    assert!(outcome.is_err(), "run should still be pending");

    let orphaned = harness.events.with_outcome(EventOutcome::Orphaned);
    let [event] = orphaned.as_slice() else {
        panic!("expected one orphaned event, got {orphaned:?}");
    };
    assert_eq!(event.step(), ProvisioningStep::AllocateAgent);
    assert_eq!(event.attribute("resource"), Some("agent_configuration agent-1"));
    assert_eq!(event.attribute("reason"), Some("run cancelled before completion"));

    // The lease is left to expire rather than released from a destructor.
    assert!(
        harness
            .leases
            .current(company_id(ACME_ID))
            .expect("inspect leases")
            .is_some()
    );
}
