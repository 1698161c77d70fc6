//! `PostgreSQL` per-company lease manager.

use super::{
    blocking::{ProvisioningPgPool, run_blocking},
    models::LeaseRow,
    schema::company_leases,
};
use crate::provisioning::{
    domain::{CompanyId, CompanyLease, RunId},
    ports::{CompanyLeaseManager, LeaseError, LeaseResult},
};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{Int8, Timestamptz, Uuid as SqlUuid};
use mockable::Clock;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Takes the lease when it is free, expired, or already ours.
const ACQUIRE_SQL: &str = "\
INSERT INTO company_leases (company_id, holder, acquired_at, expires_at) \
VALUES ($1, $2, $3, $4) \
ON CONFLICT (company_id) DO UPDATE \
SET holder = EXCLUDED.holder, acquired_at = EXCLUDED.acquired_at, expires_at = EXCLUDED.expires_at \
WHERE company_leases.expires_at <= EXCLUDED.acquired_at OR company_leases.holder = EXCLUDED.holder \
RETURNING company_id, holder, acquired_at, expires_at";

const ACQUIRE_ATTEMPTS: usize = 3;

#[derive(Debug, Error)]
#[error("lease for company {0} changed hands repeatedly while acquiring")]
struct LeaseContended(CompanyId);

/// `PostgreSQL`-backed lease manager.
///
/// Acquisition is a single conditional upsert, so concurrent runs on
/// separate processes cannot both win.
#[derive(Debug, Clone)]
pub struct PostgresLeaseManager<C>
where
    C: Clock + Send + Sync,
{
    pool: ProvisioningPgPool,
    clock: Arc<C>,
}

impl<C> PostgresLeaseManager<C>
where
    C: Clock + Send + Sync,
{
    /// Creates a lease manager from a connection pool and clock.
    #[must_use]
    pub const fn new(pool: ProvisioningPgPool, clock: Arc<C>) -> Self {
        Self { pool, clock }
    }
}

#[async_trait]
impl<C> CompanyLeaseManager for PostgresLeaseManager<C>
where
    C: Clock + Send + Sync,
{
    async fn try_acquire(
        &self,
        company_id: CompanyId,
        holder: RunId,
        ttl: Duration,
    ) -> LeaseResult<CompanyLease> {
        let now = self.clock.utc();
        let expires_at = TimeDelta::from_std(ttl)
            .ok()
            .filter(|delta| *delta > TimeDelta::zero())
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or(LeaseError::InvalidTtl(ttl))?;

        run_blocking(&self.pool, LeaseError::backend, move |connection| {
            for _ in 0..ACQUIRE_ATTEMPTS {
                if let Some(row) = upsert(connection, company_id, holder, now, expires_at)? {
                    return row_to_lease(row);
                }
                let current = company_leases::table
                    .filter(company_leases::company_id.eq(company_id.value()))
                    .select(LeaseRow::as_select())
                    .first::<LeaseRow>(connection)
                    .optional()
                    .map_err(LeaseError::backend)?;
                if let Some(row) = current {
                    return Err(LeaseError::Held {
                        company_id,
                        holder: RunId::from_uuid(row.holder),
                        expires_at: row.expires_at,
                    });
                }
                // Released between the upsert and the lookup; try again.
            }
            Err(LeaseError::backend(LeaseContended(company_id)))
        })
        .await
    }

    async fn release(&self, lease: &CompanyLease) -> LeaseResult<()> {
        let company_id = lease.company_id().value();
        let holder = lease.holder().into_inner();
        run_blocking(&self.pool, LeaseError::backend, move |connection| {
            diesel::delete(
                company_leases::table
                    .filter(company_leases::company_id.eq(company_id))
                    .filter(company_leases::holder.eq(holder)),
            )
            .execute(connection)
            .map_err(LeaseError::backend)?;
            Ok(())
        })
        .await
    }
}

fn upsert(
    connection: &mut PgConnection,
    company_id: CompanyId,
    holder: RunId,
    now: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> LeaseResult<Option<LeaseRow>> {
    diesel::sql_query(ACQUIRE_SQL)
        .bind::<Int8, _>(company_id.value())
        .bind::<SqlUuid, _>(holder.into_inner())
        .bind::<Timestamptz, _>(now)
        .bind::<Timestamptz, _>(expires_at)
        .get_result::<LeaseRow>(connection)
        .optional()
        .map_err(LeaseError::backend)
}

fn row_to_lease(row: LeaseRow) -> LeaseResult<CompanyLease> {
    let company_id = CompanyId::new(row.company_id).map_err(LeaseError::backend)?;
    Ok(CompanyLease::new(
        company_id,
        RunId::from_uuid(row.holder),
        row.acquired_at,
        row.expires_at,
    ))
}
