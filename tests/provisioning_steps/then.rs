//! Then steps for provisioning BDD scenarios.

use super::world::{ProvisioningWorld, run_async};
use agentline::provisioning::{
    domain::{CompanyId, TelephonyNumber},
    ports::{AgentDirectory, CompanyDirectory},
};
use eyre::WrapErr;
use rstest_bdd_macros::then;

#[then(r#"provisioning succeeds with the number "{number}""#)]
fn provisioning_succeeds(world: &ProvisioningWorld, number: String) -> Result<(), eyre::Report> {
    let receipt = world
        .last_result()?
        .as_ref()
        .map_err(|err| eyre::eyre!("expected success, got {err}"))?;
    if receipt.telephony_number.as_str() != number {
        return Err(eyre::eyre!(
            "expected number {number}, got {}",
            receipt.telephony_number
        ));
    }
    Ok(())
}

#[then("provisioning fails with status {status:u16}")]
fn provisioning_fails(world: &ProvisioningWorld, status: u16) -> Result<(), eyre::Report> {
    match world.last_result()? {
        Ok(receipt) => Err(eyre::eyre!("expected failure, got {receipt:?}")),
        Err(err) if err.status_code() == status => Ok(()),
        Err(err) => Err(eyre::eyre!(
            "expected status {status}, got {} ({err})",
            err.status_code()
        )),
    }
}

#[then(r#"company {id:i64} has the number "{number}""#)]
fn company_has_number(
    world: &ProvisioningWorld,
    id: i64,
    number: String,
) -> Result<(), eyre::Report> {
    let expected = TelephonyNumber::new(number)?;
    let company = run_async(world.companies.find_by_id(CompanyId::new(id)?))
        .wrap_err("look up company")?
        .ok_or_else(|| eyre::eyre!("company {id} missing"))?;
    if company.telephony_number() != Some(&expected) {
        return Err(eyre::eyre!(
            "expected {expected}, company has {:?}",
            company.telephony_number()
        ));
    }
    Ok(())
}

#[then("the number of agent records for company {id:i64} is {count:usize}")]
fn agent_record_count(
    world: &ProvisioningWorld,
    id: i64,
    count: usize,
) -> Result<(), eyre::Report> {
    let records = run_async(world.agents.find_by_company(CompanyId::new(id)?))
        .wrap_err("list agent records")?;
    if records.len() != count {
        return Err(eyre::eyre!(
            "expected {count} agent records, found {}",
            records.len()
        ));
    }
    Ok(())
}

#[then("no provider was called")]
fn no_provider_called(world: &ProvisioningWorld) -> Result<(), eyre::Report> {
    let allocations = world.agent_provider.allocate_calls()?;
    let purchases = world.telephony.acquire_calls()?;
    if allocations != 0 || purchases != 0 {
        return Err(eyre::eyre!(
            "expected no provider calls, saw {allocations} allocations and {purchases} purchases"
        ));
    }
    Ok(())
}

#[then(r#"the number "{number}" was released"#)]
fn number_released(world: &ProvisioningWorld, number: String) -> Result<(), eyre::Report> {
    let expected = TelephonyNumber::new(number)?;
    let released = world.telephony.released()?;
    if !released.contains(&expected) {
        return Err(eyre::eyre!("{expected} not released, released: {released:?}"));
    }
    Ok(())
}

#[then("the number of unresolved orphans is {count:usize}")]
fn unresolved_orphan_count(world: &ProvisioningWorld, count: usize) -> Result<(), eyre::Report> {
    let unresolved = run_async(world.reconciliation().list_unresolved())
        .wrap_err("list unresolved orphans")?;
    if unresolved.len() != count {
        return Err(eyre::eyre!(
            "expected {count} unresolved orphans, found {}",
            unresolved.len()
        ));
    }
    Ok(())
}
