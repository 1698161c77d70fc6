//! Behaviour tests for agent provisioning and reconciliation.

mod provisioning_steps;

use provisioning_steps::world::{ProvisioningWorld, world};
use rstest_bdd_macros::scenario;

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Provision a load board agent"
)]
#[tokio::test(flavor = "multi_thread")]
async fn provision_load_board_agent(world: ProvisioningWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Reject an unsupported agent type"
)]
#[tokio::test(flavor = "multi_thread")]
async fn reject_unsupported_agent_type(world: ProvisioningWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Reject a company that already has a number"
)]
#[tokio::test(flavor = "multi_thread")]
async fn reject_already_provisioned_company(world: ProvisioningWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Release the number when the agent record cannot be saved"
)]
#[tokio::test(flavor = "multi_thread")]
async fn release_number_on_persistence_failure(world: ProvisioningWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/provisioning.feature",
    name = "Reconcile a number the run could not release"
)]
#[tokio::test(flavor = "multi_thread")]
async fn reconcile_unreleased_number(world: ProvisioningWorld) {
    let _ = world;
}
