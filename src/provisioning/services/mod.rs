//! Application services for agent provisioning.

mod provisioning;
mod reconciliation;
mod saga;

pub use provisioning::{
    CompensationPolicy, FaultClass, LeaseLoss, PersistenceFailure, ProvisioningError,
    ProvisioningPorts, ProvisioningReceipt, ProvisioningRequest, ProvisioningResult,
    ProvisioningService, ProvisioningSettings, StepTimedOut, ValidationError,
};
pub use reconciliation::{ReconciliationError, ReconciliationResult, ReconciliationService};
