//! `PostgreSQL` agent directory.

use super::{
    blocking::{ProvisioningPgPool, run_blocking},
    models::{AgentRow, NewAgentRow},
    schema::agents,
};
use crate::provisioning::{
    domain::{
        AgentId, AgentRecord, AgentType, CompanyId, NewAgentRecord, PersistedAgentData,
        ProviderAgentId, TelephonyNumber,
    },
    ports::{AgentDirectory, AgentDirectoryError, AgentDirectoryResult},
};
use async_trait::async_trait;
use diesel::prelude::*;

/// `PostgreSQL`-backed agent directory.
///
/// Identifiers come from the `agents.id` sequence.
#[derive(Debug, Clone)]
pub struct PostgresAgentDirectory {
    pool: ProvisioningPgPool,
}

impl PostgresAgentDirectory {
    /// Creates a directory from a connection pool.
    #[must_use]
    pub const fn new(pool: ProvisioningPgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentDirectory for PostgresAgentDirectory {
    async fn insert(&self, record: &NewAgentRecord) -> AgentDirectoryResult<AgentRecord> {
        let new_row = NewAgentRow {
            company_id: record.company_id.value(),
            agent_type: record.agent_type.as_str().to_owned(),
            provider_agent_id: record.provider_agent_id.as_str().to_owned(),
            telephony_number: record.telephony_number.as_str().to_owned(),
            created_at: record.created_at,
        };

        run_blocking(&self.pool, AgentDirectoryError::persistence, move |connection| {
            let row = diesel::insert_into(agents::table)
                .values(&new_row)
                .returning(AgentRow::as_returning())
                .get_result::<AgentRow>(connection)
                .map_err(AgentDirectoryError::persistence)?;
            row_to_record(row)
        })
        .await
    }

    async fn delete(&self, id: AgentId) -> AgentDirectoryResult<()> {
        run_blocking(&self.pool, AgentDirectoryError::persistence, move |connection| {
            let deleted = diesel::delete(agents::table.filter(agents::id.eq(id.value())))
                .execute(connection)
                .map_err(AgentDirectoryError::persistence)?;
            if deleted == 0 {
                return Err(AgentDirectoryError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_company(&self, company_id: CompanyId) -> AgentDirectoryResult<Vec<AgentRecord>> {
        run_blocking(&self.pool, AgentDirectoryError::persistence, move |connection| {
            let rows = agents::table
                .filter(agents::company_id.eq(company_id.value()))
                .order(agents::id.asc())
                .select(AgentRow::as_select())
                .load::<AgentRow>(connection)
                .map_err(AgentDirectoryError::persistence)?;
            rows.into_iter().map(row_to_record).collect()
        })
        .await
    }
}

fn row_to_record(row: AgentRow) -> AgentDirectoryResult<AgentRecord> {
    let AgentRow {
        id,
        company_id,
        agent_type,
        provider_agent_id,
        telephony_number,
        created_at,
    } = row;

    let data = PersistedAgentData {
        id: AgentId::new(id).map_err(AgentDirectoryError::invalid_persisted_data)?,
        company_id: CompanyId::new(company_id)
            .map_err(AgentDirectoryError::invalid_persisted_data)?,
        agent_type: AgentType::try_from(agent_type.as_str())
            .map_err(AgentDirectoryError::invalid_persisted_data)?,
        provider_agent_id: ProviderAgentId::new(provider_agent_id)
            .map_err(AgentDirectoryError::invalid_persisted_data)?,
        telephony_number: TelephonyNumber::new(telephony_number)
            .map_err(AgentDirectoryError::invalid_persisted_data)?,
        created_at,
    };
    Ok(AgentRecord::from_persisted(data))
}
