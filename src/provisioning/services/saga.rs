//! Saga bookkeeping for a provisioning run.

use crate::provisioning::{
    domain::{
        AgentId, CompanyId, EventOutcome, OrphanKind, ProviderAgentId, ProvisioningEvent,
        ProvisioningStep, RunId, TelephonyNumber,
    },
    ports::ProvisioningEventSink,
};
use mockable::Clock;
use std::sync::Arc;

/// Identifies the run a saga belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RunContext {
    pub(crate) run_id: RunId,
    pub(crate) company_id: CompanyId,
}

/// Undo action registered by a completed forward step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Compensation {
    ReleaseAgentConfiguration(ProviderAgentId),
    ReleaseTelephonyNumber(TelephonyNumber),
    DeleteAgentRecord(AgentId),
}

impl Compensation {
    /// Forward step whose side effect this compensation undoes.
    pub(crate) const fn step(&self) -> ProvisioningStep {
        match self {
            Self::ReleaseAgentConfiguration(_) => ProvisioningStep::AllocateAgent,
            Self::ReleaseTelephonyNumber(_) => ProvisioningStep::AcquireNumber,
            Self::DeleteAgentRecord(_) => ProvisioningStep::PersistAgent,
        }
    }

    /// Resource left behind when the compensation does not run.
    pub(crate) fn orphan_kind(&self) -> OrphanKind {
        match self {
            Self::ReleaseAgentConfiguration(id) => OrphanKind::AgentConfiguration(id.clone()),
            Self::ReleaseTelephonyNumber(number) => OrphanKind::TelephonyNumber(number.clone()),
            Self::DeleteAgentRecord(id) => OrphanKind::AgentRecord(*id),
        }
    }
}

/// Ordered compensations of the forward steps completed so far.
///
/// A log dropped before it is settled means the run future was cancelled
/// mid-flight; every outstanding resource is then reported as orphaned to the
/// event sink. Nothing is spawned from `Drop`.
pub(crate) struct SagaLog<C>
where
    C: Clock + Send + Sync,
{
    run: RunContext,
    events: Arc<dyn ProvisioningEventSink>,
    clock: Arc<C>,
    pending: Vec<Compensation>,
    settled: bool,
}

impl<C> SagaLog<C>
where
    C: Clock + Send + Sync,
{
    pub(crate) fn new(run: RunContext, events: Arc<dyn ProvisioningEventSink>, clock: Arc<C>) -> Self {
        Self {
            run,
            events,
            clock,
            pending: Vec::new(),
            settled: false,
        }
    }

    pub(crate) fn push(&mut self, compensation: Compensation) {
        self.pending.push(compensation);
    }

    /// Most recently registered compensation still outstanding.
    pub(crate) fn last(&self) -> Option<&Compensation> {
        self.pending.last()
    }

    /// Drops the most recent compensation once it has been handled.
    pub(crate) fn pop(&mut self) {
        self.pending.pop();
    }

    /// Marks the run as finished; remaining compensations are discarded.
    pub(crate) fn settle(&mut self) {
        self.pending.clear();
        self.settled = true;
    }
}

impl<C> Drop for SagaLog<C>
where
    C: Clock + Send + Sync,
{
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        for compensation in self.pending.iter().rev() {
            let event = ProvisioningEvent::new(
                self.run.run_id,
                self.run.company_id,
                compensation.step(),
                EventOutcome::Orphaned,
                &*self.clock,
            )
            .with_attribute("resource", compensation.orphan_kind())
            .with_attribute("reason", "run cancelled before completion");
            self.events.emit(&event);
        }
    }
}
