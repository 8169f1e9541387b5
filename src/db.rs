use futures::future::BoxFuture;
use sqlx::{postgres::PgPoolOptions, PgConnection, PgPool};
use tracing::{debug, warn};

use crate::{config::DatabaseConfig, error::StoreError};

/// Bounded pool of PostgreSQL connections shared by every request.
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    pool: PgPool,
}

impl ConnectionPool {
    /// No connection is opened here; an unreachable server surfaces on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy_with(config.connect_options());
        debug!(
            host = %config.host,
            port = config.port,
            database = %config.database,
            max_connections = config.max_connections,
            acquire_timeout = ?config.acquire_timeout,
            "connection pool configured"
        );
        Self { pool }
    }

    /// Runs one unit of work on a pooled connection. Callers beyond the pool
    /// size wait for a free connection; the connection goes back to the pool
    /// as soon as `op` completes.
    pub async fn run<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> BoxFuture<'c, Result<T, sqlx::Error>> + Send,
    {
        let mut conn = self.pool.acquire().await.map_err(|e| {
            warn!(error = %e, "failed to acquire connection");
            StoreError::Unavailable(e.to_string())
        })?;
        let out = op(&mut *conn).await?;
        Ok(out)
    }
}
