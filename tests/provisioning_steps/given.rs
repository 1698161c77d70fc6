//! Given steps for provisioning BDD scenarios.

use super::world::ProvisioningWorld;
use agentline::provisioning::domain::{
    CompanyId, CompanyName, CompanyProfile, CountryCode, TelephonyNumber,
};
use rstest_bdd_macros::given;

fn profile(id: i64, name: &str) -> Result<CompanyProfile, eyre::Report> {
    Ok(CompanyProfile::new(CompanyId::new(id)?, CompanyName::new(name)?))
}

#[given(r#"a company {id:i64} named "{name}" without a number"#)]
fn company_without_number(
    world: &mut ProvisioningWorld,
    id: i64,
    name: String,
) -> Result<(), eyre::Report> {
    world.companies.insert_company(profile(id, &name)?)?;
    Ok(())
}

#[given(r#"a company {id:i64} named "{name}" with the number "{number}""#)]
fn company_with_number(
    world: &mut ProvisioningWorld,
    id: i64,
    name: String,
    number: String,
) -> Result<(), eyre::Report> {
    let attached = TelephonyNumber::new(number)?;
    world
        .companies
        .insert_company(profile(id, &name)?.with_telephony_number(attached))?;
    Ok(())
}

#[given(r#"the telephony provider has the number "{number}" available"#)]
fn number_available(world: &mut ProvisioningWorld, number: String) -> Result<(), eyre::Report> {
    world
        .telephony
        .add_available(TelephonyNumber::new(number)?, CountryCode::new("US")?, true)?;
    Ok(())
}

#[given("the agent directory rejects writes")]
fn agent_directory_rejects_writes(world: &mut ProvisioningWorld) -> Result<(), eyre::Report> {
    world.agents.set_fail_inserts(true)?;
    Ok(())
}

#[given("the telephony provider rejects releases")]
fn telephony_rejects_releases(world: &mut ProvisioningWorld) -> Result<(), eyre::Report> {
    world.telephony.set_fail_releases(true)?;
    Ok(())
}
