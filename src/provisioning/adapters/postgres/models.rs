//! Diesel row models for provisioning persistence.

use super::schema::{agents, companies, company_leases, orphaned_resources};
use chrono::{DateTime, Utc};
use diesel::prelude::*;

/// Query result row for companies.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = companies)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CompanyRow {
    /// Company identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Attached number.
    pub telephony_number: Option<String>,
}

/// Query result row for agent records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = agents)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AgentRow {
    /// Directory-assigned identifier.
    pub id: i64,
    /// Owning company.
    pub company_id: i64,
    /// Agent type storage name.
    pub agent_type: String,
    /// Remote agent configuration identifier.
    pub provider_agent_id: String,
    /// Attached number.
    pub telephony_number: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Insert model for agent records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = agents)]
pub struct NewAgentRow {
    /// Owning company.
    pub company_id: i64,
    /// Agent type storage name.
    pub agent_type: String,
    /// Remote agent configuration identifier.
    pub provider_agent_id: String,
    /// Attached number.
    pub telephony_number: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Lease row returned by the conditional upsert.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = company_leases)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct LeaseRow {
    /// Leased company.
    #[diesel(sql_type = diesel::sql_types::Int8)]
    pub company_id: i64,
    /// Run holding the lease.
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    pub holder: uuid::Uuid,
    /// Acquisition timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub acquired_at: DateTime<Utc>,
    /// Expiry timestamp.
    #[diesel(sql_type = diesel::sql_types::Timestamptz)]
    pub expires_at: DateTime<Utc>,
}

/// Query result and insert row for orphan ledger entries.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = orphaned_resources)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrphanRow {
    /// Ledger entry identifier.
    pub id: uuid::Uuid,
    /// Run that acquired the resource.
    pub run_id: uuid::Uuid,
    /// Company the resource was acquired for.
    pub company_id: i64,
    /// Orphan kind storage name.
    pub kind: String,
    /// External reference of the resource.
    pub reference: String,
    /// Why the resource could not be undone.
    pub reason: String,
    /// When the orphan was recorded.
    pub recorded_at: DateTime<Utc>,
    /// When an operator reconciled the orphan.
    pub resolved_at: Option<DateTime<Utc>>,
}
