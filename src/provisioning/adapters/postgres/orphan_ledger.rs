//! `PostgreSQL` orphan ledger.

use super::{
    blocking::{ProvisioningPgPool, run_blocking},
    models::OrphanRow,
    schema::orphaned_resources,
};
use crate::provisioning::{
    domain::{CompanyId, OrphanId, OrphanKind, OrphanedResource, PersistedOrphanData, RunId},
    ports::{OrphanLedger, OrphanLedgerError, OrphanLedgerResult},
};
use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

/// `PostgreSQL`-backed orphan ledger.
#[derive(Debug, Clone)]
pub struct PostgresOrphanLedger {
    pool: ProvisioningPgPool,
}

impl PostgresOrphanLedger {
    /// Creates a ledger from a connection pool.
    #[must_use]
    pub const fn new(pool: ProvisioningPgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrphanLedger for PostgresOrphanLedger {
    async fn record(&self, orphan: &OrphanedResource) -> OrphanLedgerResult<()> {
        let orphan_id = orphan.id();
        let row = to_row(orphan);
        run_blocking(&self.pool, OrphanLedgerError::persistence, move |connection| {
            diesel::insert_into(orphaned_resources::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        OrphanLedgerError::Duplicate(orphan_id)
                    }
                    _ => OrphanLedgerError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: OrphanId) -> OrphanLedgerResult<Option<OrphanedResource>> {
        run_blocking(&self.pool, OrphanLedgerError::persistence, move |connection| {
            let row = orphaned_resources::table
                .filter(orphaned_resources::id.eq(id.into_inner()))
                .select(OrphanRow::as_select())
                .first::<OrphanRow>(connection)
                .optional()
                .map_err(OrphanLedgerError::persistence)?;
            row.map(row_to_orphan).transpose()
        })
        .await
    }

    async fn list_unresolved(&self) -> OrphanLedgerResult<Vec<OrphanedResource>> {
        run_blocking(&self.pool, OrphanLedgerError::persistence, move |connection| {
            let rows = orphaned_resources::table
                .filter(orphaned_resources::resolved_at.is_null())
                .order(orphaned_resources::recorded_at.asc())
                .select(OrphanRow::as_select())
                .load::<OrphanRow>(connection)
                .map_err(OrphanLedgerError::persistence)?;
            rows.into_iter().map(row_to_orphan).collect()
        })
        .await
    }

    async fn update(&self, orphan: &OrphanedResource) -> OrphanLedgerResult<()> {
        let orphan_id = orphan.id();
        let reason = orphan.reason().to_owned();
        let resolved_at = orphan.resolved_at();
        run_blocking(&self.pool, OrphanLedgerError::persistence, move |connection| {
            let updated = diesel::update(
                orphaned_resources::table
                    .filter(orphaned_resources::id.eq(orphan_id.into_inner())),
            )
            .set((
                orphaned_resources::reason.eq(&reason),
                orphaned_resources::resolved_at.eq(resolved_at),
            ))
            .execute(connection)
            .map_err(OrphanLedgerError::persistence)?;
            if updated == 0 {
                return Err(OrphanLedgerError::NotFound(orphan_id));
            }
            Ok(())
        })
        .await
    }
}

fn to_row(orphan: &OrphanedResource) -> OrphanRow {
    OrphanRow {
        id: orphan.id().into_inner(),
        run_id: orphan.run_id().into_inner(),
        company_id: orphan.company_id().value(),
        kind: orphan.kind().as_str().to_owned(),
        reference: orphan.kind().reference(),
        reason: orphan.reason().to_owned(),
        recorded_at: orphan.recorded_at(),
        resolved_at: orphan.resolved_at(),
    }
}

fn row_to_orphan(row: OrphanRow) -> OrphanLedgerResult<OrphanedResource> {
    let OrphanRow {
        id,
        run_id,
        company_id,
        kind,
        reference,
        reason,
        recorded_at,
        resolved_at,
    } = row;

    let data = PersistedOrphanData {
        id: OrphanId::from_uuid(id),
        run_id: RunId::from_uuid(run_id),
        company_id: CompanyId::new(company_id)
            .map_err(OrphanLedgerError::invalid_persisted_data)?,
        kind: OrphanKind::from_parts(&kind, &reference)
            .map_err(OrphanLedgerError::invalid_persisted_data)?,
        reason,
        recorded_at,
        resolved_at,
    };
    Ok(OrphanedResource::from_persisted(data))
}
