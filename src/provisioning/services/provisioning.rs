//! Service layer orchestrating a provisioning run.

use super::saga::{Compensation, RunContext, SagaLog};
use crate::provisioning::{
    domain::{
        AgentBlueprint, AgentId, AgentType, CompanyId, CompanyLease, CompanyProfile,
        EventOutcome, NewAgentRecord, NumberPolicy, OrphanKind, OrphanedResource,
        ProviderAgentId, ProvisioningDomainError, ProvisioningEvent, ProvisioningStep, RunId,
        TelephonyNumber,
    },
    ports::{
        AgentDirectory, AgentDirectoryError, AgentProvider, AgentProviderError,
        CompanyDirectory, CompanyDirectoryError, CompanyLeaseManager, LeaseError, OrphanLedger,
        ProvisioningEventSink, TelephonyError, TelephonyProvider,
    },
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default bound on provider calls and directory reads.
const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);
/// Default lifetime of a per-company lease.
const DEFAULT_LEASE_TTL: Duration = Duration::from_secs(120);

/// Request payload for provisioning an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    company_id: i64,
    agent_type: String,
}

impl ProvisioningRequest {
    /// Creates a request from raw caller input.
    #[must_use]
    pub fn new(company_id: i64, agent_type: impl Into<String>) -> Self {
        Self {
            company_id,
            agent_type: agent_type.into(),
        }
    }

    /// Returns the requested company identifier.
    #[must_use]
    pub const fn company_id(&self) -> i64 {
        self.company_id
    }

    /// Returns the requested agent type.
    #[must_use]
    pub fn agent_type(&self) -> &str {
        &self.agent_type
    }
}

/// Successful outcome of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReceipt {
    /// Run that produced the receipt.
    pub run_id: RunId,
    /// Provisioned company.
    pub company_id: CompanyId,
    /// Identifier assigned by the agent directory.
    pub agent_id: AgentId,
    /// Number attached to the company.
    pub telephony_number: TelephonyNumber,
    /// Identifier of the remote agent configuration.
    pub provider_agent_id: ProviderAgentId,
}

/// Which automatic compensations a run may perform.
///
/// A disabled compensation leaves the resource in the orphan ledger instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompensationPolicy {
    /// Release purchased numbers when a later step fails.
    pub release_numbers: bool,
    /// Release allocated agent configurations when a later step fails.
    pub release_agent_configurations: bool,
}

impl Default for CompensationPolicy {
    fn default() -> Self {
        Self {
            release_numbers: true,
            release_agent_configurations: true,
        }
    }
}

impl CompensationPolicy {
    const fn allows(self, compensation: &Compensation) -> bool {
        match compensation {
            Compensation::ReleaseAgentConfiguration(_) => self.release_agent_configurations,
            Compensation::ReleaseTelephonyNumber(_) => self.release_numbers,
            Compensation::DeleteAgentRecord(_) => true,
        }
    }
}

/// Tunables of the provisioning workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningSettings {
    number_policy: NumberPolicy,
    step_timeout: Duration,
    lease_ttl: Duration,
    allow_reprovision: bool,
    compensation: CompensationPolicy,
}

impl ProvisioningSettings {
    /// Creates settings with default timeouts for the given number policy.
    #[must_use]
    pub fn new(number_policy: NumberPolicy) -> Self {
        Self {
            number_policy,
            step_timeout: DEFAULT_STEP_TIMEOUT,
            lease_ttl: DEFAULT_LEASE_TTL,
            allow_reprovision: false,
            compensation: CompensationPolicy::default(),
        }
    }

    /// Sets the bound applied to provider calls and directory reads.
    #[must_use]
    pub const fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    /// Sets the per-company lease lifetime.
    #[must_use]
    pub const fn with_lease_ttl(mut self, lease_ttl: Duration) -> Self {
        self.lease_ttl = lease_ttl;
        self
    }

    /// Allows provisioning a company that already has a number.
    #[must_use]
    pub const fn with_allow_reprovision(mut self, allow_reprovision: bool) -> Self {
        self.allow_reprovision = allow_reprovision;
        self
    }

    /// Sets the compensation policy.
    #[must_use]
    pub const fn with_compensation(mut self, compensation: CompensationPolicy) -> Self {
        self.compensation = compensation;
        self
    }

    /// Returns the number policy.
    #[must_use]
    pub const fn number_policy(&self) -> &NumberPolicy {
        &self.number_policy
    }

    /// Returns the bound applied to provider calls and directory reads.
    #[must_use]
    pub const fn step_timeout(&self) -> Duration {
        self.step_timeout
    }

    /// Returns the per-company lease lifetime.
    #[must_use]
    pub const fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }
}

/// Collaborators of a provisioning run.
#[derive(Clone)]
pub struct ProvisioningPorts {
    /// Company directory.
    pub companies: Arc<dyn CompanyDirectory>,
    /// Agent directory.
    pub agents: Arc<dyn AgentDirectory>,
    /// Conversational-agent provider.
    pub agent_provider: Arc<dyn AgentProvider>,
    /// Telephony provisioning provider.
    pub telephony: Arc<dyn TelephonyProvider>,
    /// Per-company lease manager.
    pub leases: Arc<dyn CompanyLeaseManager>,
    /// Orphan ledger.
    pub orphans: Arc<dyn OrphanLedger>,
    /// Event sink.
    pub events: Arc<dyn ProvisioningEventSink>,
}

/// Request validation failures. Nothing has been changed when one is
/// returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The agent type is not in the supported set.
    #[error("unsupported agent type: {0}")]
    UnsupportedAgentType(String),

    /// The company identifier is not a positive integer.
    #[error("invalid company identifier: {0}")]
    InvalidCompanyId(i64),

    /// The company does not exist.
    #[error("company not found: {0}")]
    CompanyNotFound(CompanyId),

    /// The company already has a number and reprovisioning is disabled.
    #[error("company {company_id} already has telephony number {number}")]
    AlreadyProvisioned {
        /// Company that was already provisioned.
        company_id: CompanyId,
        /// Number currently attached.
        number: TelephonyNumber,
    },
}

/// Directory write that failed after external resources were acquired.
#[derive(Debug, Clone, Error)]
pub enum PersistenceFailure {
    /// Agent directory failure.
    #[error(transparent)]
    Agents(#[from] AgentDirectoryError),
    /// Company directory failure.
    #[error(transparent)]
    Companies(#[from] CompanyDirectoryError),
}

/// Why a run stopped trusting its company lease.
#[derive(Debug, Clone, Error)]
pub enum LeaseLoss {
    /// The lease could not be renewed.
    #[error(transparent)]
    Renewal(#[from] LeaseError),
    /// The company's number changed while the lease had lapsed.
    #[error("company number changed from {expected:?} to {found:?} while the lease had lapsed")]
    CompanyChanged {
        /// Number seen when the run loaded the company.
        expected: Option<TelephonyNumber>,
        /// Number found before attaching.
        found: Option<TelephonyNumber>,
    },
    /// Re-reading the company failed.
    #[error(transparent)]
    Directory(#[from] CompanyDirectoryError),
    /// The company disappeared while the lease had lapsed.
    #[error("company {0} no longer exists")]
    CompanyRemoved(CompanyId),
}

/// Step did not complete within the configured bound.
#[derive(Debug, Clone, Copy, Error)]
#[error("step did not complete within {0:?}")]
pub struct StepTimedOut(pub Duration);

/// Transport-agnostic classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    /// The request itself is invalid.
    Client,
    /// The request collides with existing or concurrent state.
    Conflict,
    /// A remote provider failed.
    Provider,
    /// Local infrastructure failed.
    Server,
}

/// Service-level errors for provisioning runs.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// Request validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another run holds the company lease.
    #[error("company {company_id} is being provisioned by run {holder} until {expires_at}")]
    Busy {
        /// Contended company.
        company_id: CompanyId,
        /// Run holding the lease.
        holder: RunId,
        /// When the lease lapses.
        expires_at: DateTime<Utc>,
    },

    /// The lease backend failed.
    #[error("company lease failed: {0}")]
    Lease(#[source] LeaseError),

    /// The run lost its lease after acquiring external resources.
    #[error("run lost the lease on company {company_id}: {source}")]
    LeaseLost {
        /// Company the run was provisioning.
        company_id: CompanyId,
        /// How the lease was lost.
        source: LeaseLoss,
        /// Resources that could not be undone.
        orphans: Vec<OrphanedResource>,
    },

    /// Reading the company profile failed.
    #[error("company lookup failed: {0}")]
    Directory(#[source] CompanyDirectoryError),

    /// The agent blueprint could not be built.
    #[error(transparent)]
    Blueprint(#[from] ProvisioningDomainError),

    /// The agent provider did not allocate a configuration.
    #[error("agent configuration allocation failed: {source}")]
    AgentAllocation {
        /// Provider failure.
        source: AgentProviderError,
        /// Allocations whose outcome is unknown.
        orphans: Vec<OrphanedResource>,
    },

    /// No number could be acquired.
    #[error("telephony number acquisition failed: {source}")]
    NumberAcquisition {
        /// Provider failure.
        source: TelephonyError,
        /// Resources that could not be undone.
        orphans: Vec<OrphanedResource>,
    },

    /// A directory write failed after external resources were acquired.
    #[error("{step} failed after external resources were acquired: {source}")]
    Persistence {
        /// Failed step.
        step: ProvisioningStep,
        /// Directory failure.
        source: PersistenceFailure,
        /// Resources that could not be undone.
        orphans: Vec<OrphanedResource>,
    },
}

impl ProvisioningError {
    /// Classifies the failure for mapping onto a transport response.
    #[must_use]
    pub const fn fault_class(&self) -> FaultClass {
        match self {
            Self::Validation(ValidationError::AlreadyProvisioned { .. })
            | Self::Busy { .. }
            | Self::LeaseLost {
                source:
                    LeaseLoss::Renewal(LeaseError::Held { .. }) | LeaseLoss::CompanyChanged { .. },
                ..
            } => FaultClass::Conflict,
            Self::Validation(_) => FaultClass::Client,
            Self::AgentAllocation { .. } | Self::NumberAcquisition { .. } => FaultClass::Provider,
            Self::Lease(_)
            | Self::LeaseLost { .. }
            | Self::Directory(_)
            | Self::Blueprint(_)
            | Self::Persistence { .. } => FaultClass::Server,
        }
    }

    /// Returns the HTTP status code conventionally used for the failure.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.fault_class() {
            FaultClass::Client => match self {
                Self::Validation(ValidationError::CompanyNotFound(_)) => 404,
                _ => 400,
            },
            FaultClass::Conflict => 409,
            FaultClass::Provider => 502,
            FaultClass::Server => 500,
        }
    }

    /// Returns the resources left behind by the failed run.
    #[must_use]
    pub fn orphans(&self) -> &[OrphanedResource] {
        match self {
            Self::AgentAllocation { orphans, .. }
            | Self::NumberAcquisition { orphans, .. }
            | Self::Persistence { orphans, .. }
            | Self::LeaseLost { orphans, .. } => orphans,
            _ => &[],
        }
    }
}

/// Result type for provisioning service operations.
pub type ProvisioningResult<T> = Result<T, ProvisioningError>;

/// Provisioning orchestration service.
pub struct ProvisioningService<C>
where
    C: Clock + Send + Sync,
{
    ports: ProvisioningPorts,
    settings: ProvisioningSettings,
    clock: Arc<C>,
}

impl<C> Clone for ProvisioningService<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            ports: self.ports.clone(),
            settings: self.settings.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> ProvisioningService<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a new provisioning service.
    #[must_use]
    pub const fn new(ports: ProvisioningPorts, settings: ProvisioningSettings, clock: Arc<C>) -> Self {
        Self {
            ports,
            settings,
            clock,
        }
    }

    /// Provisions an agent and telephony number for a company.
    ///
    /// Runs for the same company are serialized through a lease; a second
    /// concurrent run is rejected rather than queued. The lease is renewed
    /// before every step with an external side effect, and a run that finds
    /// it lost the lease unwinds instead of attaching its number.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisioningError::Validation`] for unsupported agent types,
    /// invalid or unknown companies and already provisioned companies,
    /// [`ProvisioningError::Busy`] when another run holds the company,
    /// [`ProvisioningError::LeaseLost`] when another run took the company over
    /// mid-flight, provider errors when allocation or number acquisition
    /// fails, and [`ProvisioningError::Persistence`] when a directory write
    /// fails after external resources were acquired.
    pub async fn register(
        &self,
        request: ProvisioningRequest,
    ) -> ProvisioningResult<ProvisioningReceipt> {
        let agent_type = AgentType::try_from(request.agent_type())
            .map_err(|err| ValidationError::UnsupportedAgentType(err.0))?;
        let company_id = CompanyId::new(request.company_id())
            .map_err(|_| ValidationError::InvalidCompanyId(request.company_id()))?;

        let run = RunContext {
            run_id: RunId::new(),
            company_id,
        };
        let lease = self.acquire_lease(run).await?;
        let outcome = self.provision(run, agent_type).await;
        self.release_lease(run, &lease).await;
        outcome
    }

    async fn acquire_lease(&self, run: RunContext) -> ProvisioningResult<CompanyLease> {
        self.publish(self.event(run, ProvisioningStep::AcquireLease, EventOutcome::Started));
        let acquired = self
            .ports
            .leases
            .try_acquire(run.company_id, run.run_id, self.settings.lease_ttl)
            .await;

        match acquired {
            Ok(lease) => {
                self.publish(
                    self.event(run, ProvisioningStep::AcquireLease, EventOutcome::Succeeded)
                        .with_attribute("expires_at", lease.expires_at()),
                );
                Ok(lease)
            }
            Err(LeaseError::Held {
                company_id,
                holder,
                expires_at,
            }) => {
                self.publish(
                    self.event(run, ProvisioningStep::AcquireLease, EventOutcome::Failed)
                        .with_attribute("holder", holder)
                        .with_attribute("expires_at", expires_at),
                );
                Err(ProvisioningError::Busy {
                    company_id,
                    holder,
                    expires_at,
                })
            }
            Err(err) => {
                self.publish(
                    self.event(run, ProvisioningStep::AcquireLease, EventOutcome::Failed)
                        .with_attribute("error", &err),
                );
                Err(ProvisioningError::Lease(err))
            }
        }
    }

    /// Extends the lease from now. Fails when another run has claimed the
    /// company since this run last renewed.
    async fn renew_lease(&self, run: RunContext) -> Result<(), LeaseError> {
        let lease = self
            .ports
            .leases
            .try_acquire(run.company_id, run.run_id, self.settings.lease_ttl)
            .await?;
        self.publish(
            self.event(run, ProvisioningStep::RenewLease, EventOutcome::Succeeded)
                .with_attribute("expires_at", lease.expires_at()),
        );
        Ok(())
    }

    async fn release_lease(&self, run: RunContext, lease: &CompanyLease) {
        let event = match self.ports.leases.release(lease).await {
            Ok(()) => self.event(run, ProvisioningStep::ReleaseLease, EventOutcome::Succeeded),
            Err(err) => self
                .event(run, ProvisioningStep::ReleaseLease, EventOutcome::Failed)
                .with_attribute("error", err),
        };
        self.publish(event);
    }

    async fn load_company(&self, run: RunContext) -> ProvisioningResult<CompanyProfile> {
        self.publish(self.event(run, ProvisioningStep::LoadCompany, EventOutcome::Started));
        let found = self
            .bounded(self.ports.companies.find_by_id(run.company_id), |after| {
                CompanyDirectoryError::persistence(StepTimedOut(after))
            })
            .await;

        let failure = match found {
            Ok(Some(company)) => match company.telephony_number() {
                Some(number) if !self.settings.allow_reprovision => {
                    ProvisioningError::Validation(ValidationError::AlreadyProvisioned {
                        company_id: run.company_id,
                        number: number.clone(),
                    })
                }
                _ => {
                    self.publish(
                        self.event(run, ProvisioningStep::LoadCompany, EventOutcome::Succeeded)
                            .with_attribute("company_name", company.name()),
                    );
                    return Ok(company);
                }
            },
            Ok(None) => ProvisioningError::Validation(ValidationError::CompanyNotFound(
                run.company_id,
            )),
            Err(err) => ProvisioningError::Directory(err),
        };
        self.publish(
            self.event(run, ProvisioningStep::LoadCompany, EventOutcome::Failed)
                .with_attribute("error", &failure),
        );
        Err(failure)
    }

    /// Renews the lease and re-reads the company so the attach writes over
    /// the state this run was started against.
    async fn fence_company(
        &self,
        run: RunContext,
        loaded: &CompanyProfile,
    ) -> Result<CompanyProfile, LeaseLoss> {
        self.renew_lease(run).await?;
        let current = self
            .bounded(self.ports.companies.find_by_id(run.company_id), |after| {
                CompanyDirectoryError::persistence(StepTimedOut(after))
            })
            .await?
            .ok_or(LeaseLoss::CompanyRemoved(run.company_id))?;
        if current.telephony_number() != loaded.telephony_number() {
            return Err(LeaseLoss::CompanyChanged {
                expected: loaded.telephony_number().cloned(),
                found: current.telephony_number().cloned(),
            });
        }
        Ok(current)
    }

    async fn provision(
        &self,
        run: RunContext,
        agent_type: AgentType,
    ) -> ProvisioningResult<ProvisioningReceipt> {
        let loaded = self.load_company(run).await?;
        let blueprint = AgentBlueprint::for_company(agent_type, loaded.name())?;
        let mut saga = SagaLog::new(run, Arc::clone(&self.ports.events), Arc::clone(&self.clock));

        self.publish(
            self.event(run, ProvisioningStep::AllocateAgent, EventOutcome::Started)
                .with_attribute("agent_type", agent_type),
        );
        let config = match self
            .bounded(
                self.ports.agent_provider.allocate(&blueprint),
                AgentProviderError::TimedOut,
            )
            .await
        {
            Ok(config) => config,
            Err(err) => {
                self.step_failed(run, ProvisioningStep::AllocateAgent, &err);
                let mut orphans = Vec::new();
                if let AgentProviderError::TimedOut(after) = &err {
                    orphans.push(
                        self.record_orphan(
                            run,
                            ProvisioningStep::AllocateAgent,
                            OrphanKind::UnconfirmedAgentConfiguration(blueprint.name.clone()),
                            unanswered(*after),
                        )
                        .await,
                    );
                }
                saga.settle();
                return Err(ProvisioningError::AgentAllocation {
                    source: err,
                    orphans,
                });
            }
        };
        let provider_agent_id = config.provider_agent_id().clone();
        self.publish(
            self.event(run, ProvisioningStep::AllocateAgent, EventOutcome::Succeeded)
                .with_attribute("provider_agent_id", &provider_agent_id),
        );
        saga.push(Compensation::ReleaseAgentConfiguration(
            provider_agent_id.clone(),
        ));

        if let Err(err) = self.renew_lease(run).await {
            return Err(self.lease_lost(run, err.into(), &mut saga).await);
        }
        self.publish(
            self.event(run, ProvisioningStep::AcquireNumber, EventOutcome::Started)
                .with_attribute("country", self.settings.number_policy.country()),
        );
        let number = match self
            .bounded(
                self.ports
                    .telephony
                    .acquire_number(&self.settings.number_policy),
                TelephonyError::TimedOut,
            )
            .await
        {
            Ok(number) => number,
            Err(err) => {
                self.step_failed(run, ProvisioningStep::AcquireNumber, &err);
                let mut orphans = Vec::new();
                if let TelephonyError::TimedOut(after) = &err {
                    orphans.push(
                        self.record_orphan(
                            run,
                            ProvisioningStep::AcquireNumber,
                            OrphanKind::UnconfirmedTelephonyNumber(
                                self.settings.number_policy.to_string(),
                            ),
                            unanswered(*after),
                        )
                        .await,
                    );
                }
                orphans.extend(self.unwind(run, &mut saga).await);
                return Err(ProvisioningError::NumberAcquisition {
                    source: err,
                    orphans,
                });
            }
        };
        self.publish(
            self.event(run, ProvisioningStep::AcquireNumber, EventOutcome::Succeeded)
                .with_attribute("telephony_number", &number),
        );
        saga.push(Compensation::ReleaseTelephonyNumber(number.clone()));

        if let Err(err) = self.renew_lease(run).await {
            return Err(self.lease_lost(run, err.into(), &mut saga).await);
        }
        self.publish(self.event(run, ProvisioningStep::PersistAgent, EventOutcome::Started));
        let new_record = NewAgentRecord::new(
            run.company_id,
            agent_type,
            provider_agent_id.clone(),
            number.clone(),
            &*self.clock,
        );
        let record = match self.ports.agents.insert(&new_record).await {
            Ok(record) => record,
            Err(err) => {
                return Err(self
                    .persistence_failed(run, ProvisioningStep::PersistAgent, err.into(), &mut saga)
                    .await);
            }
        };
        self.publish(
            self.event(run, ProvisioningStep::PersistAgent, EventOutcome::Succeeded)
                .with_attribute("agent_id", record.id()),
        );
        saga.push(Compensation::DeleteAgentRecord(record.id()));

        let mut company = match self.fence_company(run, &loaded).await {
            Ok(company) => company,
            Err(loss) => return Err(self.lease_lost(run, loss, &mut saga).await),
        };
        self.publish(
            self.event(run, ProvisioningStep::AttachNumber, EventOutcome::Started)
                .with_attribute("telephony_number", &number),
        );
        company.attach_number(number.clone());
        if let Err(err) = self.ports.companies.update(&company).await {
            return Err(self
                .persistence_failed(run, ProvisioningStep::AttachNumber, err.into(), &mut saga)
                .await);
        }
        self.publish(self.event(run, ProvisioningStep::AttachNumber, EventOutcome::Succeeded));
        saga.settle();

        Ok(ProvisioningReceipt {
            run_id: run.run_id,
            company_id: run.company_id,
            agent_id: record.id(),
            telephony_number: number,
            provider_agent_id,
        })
    }

    async fn lease_lost(
        &self,
        run: RunContext,
        source: LeaseLoss,
        saga: &mut SagaLog<C>,
    ) -> ProvisioningError {
        let mut event = self
            .event(run, ProvisioningStep::RenewLease, EventOutcome::Failed)
            .with_attribute("error", &source);
        if let LeaseLoss::Renewal(LeaseError::Held { holder, .. }) = &source {
            event = event.with_attribute("holder", holder);
        }
        self.publish(event);
        let orphans = self.unwind(run, saga).await;
        ProvisioningError::LeaseLost {
            company_id: run.company_id,
            source,
            orphans,
        }
    }

    async fn persistence_failed(
        &self,
        run: RunContext,
        step: ProvisioningStep,
        source: PersistenceFailure,
        saga: &mut SagaLog<C>,
    ) -> ProvisioningError {
        self.step_failed(run, step, &source);
        let orphans = self.unwind(run, saga).await;
        ProvisioningError::Persistence {
            step,
            source,
            orphans,
        }
    }

    /// Runs outstanding compensations newest first and returns whatever could
    /// not be undone.
    async fn unwind(&self, run: RunContext, saga: &mut SagaLog<C>) -> Vec<OrphanedResource> {
        let mut orphans = Vec::new();
        while let Some(compensation) = saga.last().cloned() {
            if let Some(orphan) = self.compensate(run, &compensation).await {
                orphans.push(orphan);
            }
            saga.pop();
        }
        saga.settle();
        orphans
    }

    async fn compensate(
        &self,
        run: RunContext,
        compensation: &Compensation,
    ) -> Option<OrphanedResource> {
        let step = compensation.step();
        let kind = compensation.orphan_kind();
        if !self.settings.compensation.allows(compensation) {
            return Some(
                self.record_orphan(run, step, kind, "automatic compensation disabled by policy")
                    .await,
            );
        }

        let undone = match compensation {
            Compensation::ReleaseAgentConfiguration(id) => self
                .bounded(
                    self.ports.agent_provider.release(id),
                    AgentProviderError::TimedOut,
                )
                .await
                .map_err(|err| err.to_string()),
            Compensation::ReleaseTelephonyNumber(number) => self
                .bounded(
                    self.ports.telephony.release_number(number),
                    TelephonyError::TimedOut,
                )
                .await
                .map_err(|err| err.to_string()),
            Compensation::DeleteAgentRecord(id) => self
                .ports
                .agents
                .delete(*id)
                .await
                .map_err(|err| err.to_string()),
        };

        match undone {
            Ok(()) => {
                self.publish(
                    self.event(run, step, EventOutcome::Compensated)
                        .with_attribute("resource", &kind),
                );
                None
            }
            Err(reason) => {
                self.publish(
                    self.event(run, step, EventOutcome::CompensationFailed)
                        .with_attribute("resource", &kind)
                        .with_attribute("error", &reason),
                );
                Some(self.record_orphan(run, step, kind, reason).await)
            }
        }
    }

    /// Writes an orphan to the ledger before the failure propagates. A ledger
    /// failure is attached to the emitted event so the resource is still
    /// traceable from logs.
    async fn record_orphan(
        &self,
        run: RunContext,
        step: ProvisioningStep,
        kind: OrphanKind,
        reason: impl Into<String>,
    ) -> OrphanedResource {
        let orphan = OrphanedResource::new(run.run_id, run.company_id, kind, reason, &*self.clock);
        let mut event = self
            .event(run, step, EventOutcome::Orphaned)
            .with_attribute("orphan_id", orphan.id())
            .with_attribute("resource", orphan.kind())
            .with_attribute("reason", orphan.reason());
        if let Err(err) = self.ports.orphans.record(&orphan).await {
            event = event.with_attribute("ledger_error", err);
        }
        self.publish(event);
        orphan
    }

    fn step_failed(&self, run: RunContext, step: ProvisioningStep, err: &impl ToString) {
        self.publish(
            self.event(run, step, EventOutcome::Failed)
                .with_attribute("error", err.to_string()),
        );
    }

    /// Bounds a provider call or directory read. Store writes are not wrapped
    /// here: abandoning the future would not stop the write, so stores bound
    /// their own statements instead.
    async fn bounded<T, E>(
        &self,
        call: impl Future<Output = Result<T, E>>,
        on_timeout: impl FnOnce(Duration) -> E,
    ) -> Result<T, E> {
        let limit = self.settings.step_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| Err(on_timeout(limit)))
    }

    fn event(
        &self,
        run: RunContext,
        step: ProvisioningStep,
        outcome: EventOutcome,
    ) -> ProvisioningEvent {
        ProvisioningEvent::new(run.run_id, run.company_id, step, outcome, &*self.clock)
    }

    fn publish(&self, event: ProvisioningEvent) {
        self.ports.events.emit(&event);
    }
}

fn unanswered(after: Duration) -> String {
    format!("provider did not answer within {after:?}; the request may still have completed")
}
