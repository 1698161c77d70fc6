//! When steps for provisioning BDD scenarios.

use super::world::{ProvisioningWorld, run_async};
use agentline::provisioning::services::ProvisioningRequest;
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when(r#"company {id:i64} requests a "{agent_type}" agent"#)]
fn company_requests_agent(
    world: &mut ProvisioningWorld,
    id: i64,
    agent_type: String,
) -> Result<(), eyre::Report> {
    let service = world.service()?;
    world.last_result = Some(run_async(
        service.register(ProvisioningRequest::new(id, agent_type)),
    ));
    Ok(())
}

#[when("the telephony provider recovers")]
fn telephony_recovers(world: &mut ProvisioningWorld) -> Result<(), eyre::Report> {
    world.telephony.set_fail_releases(false)?;
    Ok(())
}

#[when("the operator reconciles every unresolved orphan")]
fn operator_reconciles(world: &mut ProvisioningWorld) -> Result<(), eyre::Report> {
    let service = world.reconciliation();
    let pending = run_async(service.list_unresolved()).wrap_err("list unresolved orphans")?;
    for orphan in pending {
        run_async(service.reconcile(orphan.id()))
            .wrap_err_with(|| format!("reconcile {}", orphan.kind()))?;
    }
    Ok(())
}
