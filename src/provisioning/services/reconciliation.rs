//! Operator-facing reconciliation of orphaned resources.

use super::ProvisioningPorts;
use crate::provisioning::{
    domain::{OrphanId, OrphanKind, OrphanedResource},
    ports::{
        AgentDirectory, AgentDirectoryError, AgentProvider, AgentProviderError, OrphanLedger,
        OrphanLedgerError, TelephonyError, TelephonyProvider,
    },
};
use mockable::Clock;
use std::sync::Arc;
use thiserror::Error;

/// Service-level errors for reconciliation operations.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// No ledger entry exists with the given identifier.
    #[error("orphan entry {0} not found")]
    NotFound(OrphanId),

    /// The entry was already reconciled.
    #[error("orphan entry {0} is already resolved")]
    AlreadyResolved(OrphanId),

    /// Ledger operation failed.
    #[error(transparent)]
    Ledger(#[from] OrphanLedgerError),

    /// Releasing an agent configuration failed.
    #[error(transparent)]
    AgentProvider(#[from] AgentProviderError),

    /// Releasing a telephony number failed.
    #[error(transparent)]
    Telephony(#[from] TelephonyError),

    /// Deleting an agent record failed.
    #[error(transparent)]
    AgentDirectory(#[from] AgentDirectoryError),
}

/// Result type for reconciliation service operations.
pub type ReconciliationResult<T> = Result<T, ReconciliationError>;

/// Lists and undoes resources recorded in the orphan ledger.
pub struct ReconciliationService<C>
where
    C: Clock + Send + Sync,
{
    ledger: Arc<dyn OrphanLedger>,
    agents: Arc<dyn AgentDirectory>,
    agent_provider: Arc<dyn AgentProvider>,
    telephony: Arc<dyn TelephonyProvider>,
    clock: Arc<C>,
}

impl<C> Clone for ReconciliationService<C>
where
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            ledger: Arc::clone(&self.ledger),
            agents: Arc::clone(&self.agents),
            agent_provider: Arc::clone(&self.agent_provider),
            telephony: Arc::clone(&self.telephony),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C> ReconciliationService<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a reconciliation service sharing the provisioning ports.
    #[must_use]
    pub fn new(ports: &ProvisioningPorts, clock: Arc<C>) -> Self {
        Self {
            ledger: Arc::clone(&ports.orphans),
            agents: Arc::clone(&ports.agents),
            agent_provider: Arc::clone(&ports.agent_provider),
            telephony: Arc::clone(&ports.telephony),
            clock,
        }
    }

    /// Returns every unresolved orphan, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReconciliationError::Ledger`] when the ledger lookup fails.
    pub async fn list_unresolved(&self) -> ReconciliationResult<Vec<OrphanedResource>> {
        Ok(self.ledger.list_unresolved().await?)
    }

    /// Undoes an orphaned resource and marks the entry resolved.
    ///
    /// A resource the remote side or directory no longer knows about counts
    /// as undone. On any other failure the entry stays unresolved.
    ///
    /// Unconfirmed resources carry no identifier to release; reconciling one
    /// records that the operator has checked the provider by hand.
    ///
    /// # Errors
    ///
    /// Returns [`ReconciliationError::NotFound`] for unknown entries,
    /// [`ReconciliationError::AlreadyResolved`] for reconciled entries, and
    /// provider, directory or ledger errors when the compensating action or
    /// the ledger update fails.
    pub async fn reconcile(&self, id: OrphanId) -> ReconciliationResult<OrphanedResource> {
        let mut orphan = self
            .ledger
            .find_by_id(id)
            .await?
            .ok_or(ReconciliationError::NotFound(id))?;
        if orphan.is_resolved() {
            return Err(ReconciliationError::AlreadyResolved(id));
        }

        match orphan.kind() {
            OrphanKind::AgentConfiguration(agent_id) => {
                self.agent_provider.release(agent_id).await?;
            }
            OrphanKind::TelephonyNumber(number) => {
                match self.telephony.release_number(number).await {
                    Ok(()) | Err(TelephonyError::UnknownNumber(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }
            OrphanKind::AgentRecord(agent_id) => match self.agents.delete(*agent_id).await {
                Ok(()) | Err(AgentDirectoryError::NotFound(_)) => {}
                Err(err) => return Err(err.into()),
            },
            OrphanKind::UnconfirmedAgentConfiguration(_)
            | OrphanKind::UnconfirmedTelephonyNumber(_) => {}
        }

        orphan.resolve(&*self.clock);
        self.ledger.update(&orphan).await?;
        Ok(orphan)
    }
}
