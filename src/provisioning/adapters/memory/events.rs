//! Event sink that keeps every event for later inspection.

use std::sync::{Arc, Mutex};

use crate::provisioning::{
    domain::{EventOutcome, ProvisioningEvent, ProvisioningStep},
    ports::ProvisioningEventSink,
};

/// Thread-safe sink recording events in emission order.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<ProvisioningEvent>>>,
}

impl RecordingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded event in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<ProvisioningEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Returns the recorded events with the given outcome.
    #[must_use]
    pub fn with_outcome(&self, outcome: EventOutcome) -> Vec<ProvisioningEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.outcome() == outcome)
            .collect()
    }

    /// Returns the outcomes recorded for a step in emission order.
    #[must_use]
    pub fn outcomes_for(&self, step: ProvisioningStep) -> Vec<EventOutcome> {
        self.events()
            .iter()
            .filter(|event| event.step() == step)
            .map(ProvisioningEvent::outcome)
            .collect()
    }
}

impl ProvisioningEventSink for RecordingEventSink {
    fn emit(&self, event: &ProvisioningEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
