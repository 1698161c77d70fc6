//! `PostgreSQL` company directory.

use super::{
    blocking::{ProvisioningPgPool, run_blocking},
    models::CompanyRow,
    schema::companies,
};
use crate::provisioning::{
    domain::{CompanyId, CompanyName, CompanyProfile, TelephonyNumber},
    ports::{CompanyDirectory, CompanyDirectoryError, CompanyDirectoryResult},
};
use async_trait::async_trait;
use diesel::prelude::*;

/// `PostgreSQL`-backed company directory.
#[derive(Debug, Clone)]
pub struct PostgresCompanyDirectory {
    pool: ProvisioningPgPool,
}

impl PostgresCompanyDirectory {
    /// Creates a directory from a connection pool.
    #[must_use]
    pub const fn new(pool: ProvisioningPgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CompanyDirectory for PostgresCompanyDirectory {
    async fn find_by_id(&self, id: CompanyId) -> CompanyDirectoryResult<Option<CompanyProfile>> {
        run_blocking(&self.pool, CompanyDirectoryError::persistence, move |connection| {
            let row = companies::table
                .filter(companies::id.eq(id.value()))
                .select(CompanyRow::as_select())
                .first::<CompanyRow>(connection)
                .optional()
                .map_err(CompanyDirectoryError::persistence)?;
            row.map(row_to_profile).transpose()
        })
        .await
    }

    async fn update(&self, profile: &CompanyProfile) -> CompanyDirectoryResult<()> {
        let company_id = profile.id();
        let name = profile.name().as_str().to_owned();
        let number = profile.telephony_number().map(|n| n.as_str().to_owned());

        run_blocking(&self.pool, CompanyDirectoryError::persistence, move |connection| {
            let updated = diesel::update(companies::table.filter(companies::id.eq(company_id.value())))
                .set((
                    companies::name.eq(&name),
                    companies::telephony_number.eq(&number),
                ))
                .execute(connection)
                .map_err(CompanyDirectoryError::persistence)?;
            if updated == 0 {
                return Err(CompanyDirectoryError::NotFound(company_id));
            }
            Ok(())
        })
        .await
    }
}

fn row_to_profile(row: CompanyRow) -> CompanyDirectoryResult<CompanyProfile> {
    let company_id =
        CompanyId::new(row.id).map_err(CompanyDirectoryError::invalid_persisted_data)?;
    let company_name =
        CompanyName::new(row.name).map_err(CompanyDirectoryError::invalid_persisted_data)?;
    let attached = row
        .telephony_number
        .map(TelephonyNumber::new)
        .transpose()
        .map_err(CompanyDirectoryError::invalid_persisted_data)?;

    let mut profile = CompanyProfile::new(company_id, company_name);
    if let Some(number) = attached {
        profile.attach_number(number);
    }
    Ok(profile)
}
