//! Observability boundary for provisioning runs.

use crate::provisioning::domain::ProvisioningEvent;

/// Receives structured events describing step progress.
///
/// Emission is synchronous and infallible so it can be called from `Drop`
/// when a run is cancelled.
pub trait ProvisioningEventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: &ProvisioningEvent);
}
