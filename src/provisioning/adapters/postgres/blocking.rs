//! Offloads synchronous Diesel work to the blocking thread pool.

use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PoolError};
use diesel::{PgConnection, RunQueryDsl};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinError;

/// `PostgreSQL` connection pool shared by the provisioning adapters.
pub type ProvisioningPgPool = Pool<ConnectionManager<PgConnection>>;

/// Sets `statement_timeout` on every connection the pool opens.
///
/// Callers await store work to completion, so this is the bound on a write
/// that stalls inside the database.
#[derive(Debug, Clone, Copy)]
pub struct StatementTimeout(pub Duration);

impl CustomizeConnection<PgConnection, r2d2::Error> for StatementTimeout {
    fn on_acquire(&self, connection: &mut PgConnection) -> Result<(), r2d2::Error> {
        let millis = self.0.as_millis().max(1);
        diesel::sql_query(format!("SET statement_timeout = {millis}"))
            .execute(connection)
            .map(drop)
            .map_err(r2d2::Error::QueryError)
    }
}

/// Builds the adapters' pool with bounded checkout and statement time.
///
/// # Errors
///
/// Returns [`PoolError`] when the initial connections cannot be opened.
pub fn build_pool(
    database_url: &str,
    max_size: u32,
    checkout_timeout: Duration,
    statement_timeout: Duration,
) -> Result<ProvisioningPgPool, PoolError> {
    Pool::builder()
        .max_size(max_size)
        .connection_timeout(checkout_timeout)
        .connection_customizer(Box::new(StatementTimeout(statement_timeout)))
        .build(ConnectionManager::<PgConnection>::new(database_url))
}

/// Failure obtaining a connection or joining the blocking task.
#[derive(Debug, Error)]
pub enum BlockingFailure {
    /// No pooled connection became available.
    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError),
    /// The blocking task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(#[from] JoinError),
}

/// Runs `f` with a pooled connection on the blocking thread pool.
///
/// `map_err` converts pool and join failures into the caller's error type.
pub(super) async fn run_blocking<F, T, E, M>(
    pool: &ProvisioningPgPool,
    map_err: M,
    f: F,
) -> Result<T, E>
where
    F: FnOnce(&mut PgConnection) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    M: Fn(BlockingFailure) -> E + Copy + Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut connection = pool.get().map_err(|err| map_err(err.into()))?;
        f(&mut connection)
    })
    .await
    .map_err(|err| map_err(err.into()))?
}
