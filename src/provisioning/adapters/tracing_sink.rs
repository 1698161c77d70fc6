//! Event sink forwarding provisioning events to `tracing`.

use crate::provisioning::{
    domain::{EventOutcome, ProvisioningEvent},
    ports::ProvisioningEventSink,
};
use tracing::{error, info, warn};

/// Emits every provisioning event as a structured `tracing` record.
///
/// Failures are logged at `warn`, resources left behind at `error`, and
/// everything else at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Creates the sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ProvisioningEventSink for TracingEventSink {
    fn emit(&self, event: &ProvisioningEvent) {
        let event_name = format!(
            "provisioning.{}.{}",
            event.step().as_str(),
            event.outcome().as_str()
        );
        let attributes = serde_json::to_string(event.attributes()).unwrap_or_default();
        let run_id = event.run_id().to_string();
        let company_id = event.company_id().value();

        match event.outcome() {
            EventOutcome::Started | EventOutcome::Succeeded | EventOutcome::Compensated => {
                info!(
                    event_name = %event_name,
                    run_id = %run_id,
                    company_id,
                    attributes = %attributes,
                    "provisioning step {}", event.outcome()
                );
            }
            EventOutcome::Failed | EventOutcome::CompensationFailed => {
                warn!(
                    event_name = %event_name,
                    run_id = %run_id,
                    company_id,
                    attributes = %attributes,
                    "provisioning step {}", event.outcome()
                );
            }
            EventOutcome::Orphaned => {
                error!(
                    event_name = %event_name,
                    run_id = %run_id,
                    company_id,
                    attributes = %attributes,
                    "external resource left without a local owner; reconcile manually"
                );
            }
        }
    }
}
