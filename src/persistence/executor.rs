//! Statement execution over the lazily-bootstrapped pool.
//!
//! [`QueryExecutor`] owns the configuration and a [`tokio::sync::OnceCell`]
//! holding the bootstrap outcome. The first caller runs the setup
//! sequence; concurrent callers wait on the same cell, and every later
//! caller gets the memoized pool or the memoized setup error.

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use tokio::sync::OnceCell;

use super::bootstrap::bootstrap;
use crate::config::{ClientDefaults, StorageConfig};
use crate::error::{StorageError, StorageResult};

/// Runs parameterized statements on pooled connections.
#[derive(Debug)]
pub struct QueryExecutor {
    config: StorageConfig,
    defaults: ClientDefaults,
    pool: OnceCell<StorageResult<PgPool>>,
}

impl QueryExecutor {
    /// Creates an executor. No I/O happens until the pool is first needed.
    #[must_use]
    pub fn new(config: StorageConfig, defaults: ClientDefaults) -> Self {
        Self {
            config,
            defaults,
            pool: OnceCell::new(),
        }
    }

    /// The canonical configuration this executor connects with.
    #[must_use]
    pub const fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the pool, running the bootstrap sequence on first use.
    ///
    /// # Errors
    ///
    /// Returns the (memoized) [`StorageError::SetupFailure`] if bootstrap
    /// failed.
    pub async fn pool(&self) -> StorageResult<PgPool> {
        self.pool
            .get_or_init(|| async {
                let result = bootstrap(&self.config, &self.defaults).await;
                match &result {
                    Ok(_) => tracing::info!(
                        host = %self.config.host,
                        database = %self.config.database,
                        "connected to database"
                    ),
                    Err(err) => tracing::error!(error = %err, "error running setup"),
                }
                result
            })
            .await
            .clone()
    }

    /// Returns `true` once bootstrap has finished, successfully or not.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.pool.initialized()
    }

    /// Runs `statement` with positional text `params` and returns all rows.
    ///
    /// One connection is borrowed for the statement and returned to the
    /// pool on every exit path.
    ///
    /// # Errors
    ///
    /// Returns the setup error if bootstrap failed, or
    /// [`StorageError::QueryFailure`] carrying `statement` and the driver
    /// error.
    pub async fn fetch_all(&self, statement: &str, params: &[&str]) -> StorageResult<Vec<PgRow>> {
        let mut conn = self.acquire(statement, params.len()).await?;
        let result = bind(statement, params).fetch_all(&mut *conn).await;
        drop(conn);

        result.map_err(|e| StorageError::query(statement, &e))
    }

    /// Runs `statement` and returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Same as [`QueryExecutor::fetch_all`].
    pub async fn execute(&self, statement: &str, params: &[&str]) -> StorageResult<u64> {
        let mut conn = self.acquire(statement, params.len()).await?;
        let result = bind(statement, params).execute(&mut *conn).await;
        drop(conn);

        result
            .map(|done| done.rows_affected())
            .map_err(|e| StorageError::query(statement, &e))
    }

    async fn acquire(
        &self,
        statement: &str,
        params: usize,
    ) -> StorageResult<PoolConnection<Postgres>> {
        let pool = self.pool().await?;
        tracing::debug!(%statement, params, "executing statement");
        pool.acquire()
            .await
            .map_err(|e| StorageError::query(statement, &e))
    }

    /// Waits for bootstrap, then closes every pooled connection.
    ///
    /// # Errors
    ///
    /// Returns the memoized setup error if bootstrap failed.
    pub async fn close(&self) -> StorageResult<()> {
        let pool = self.pool().await?;
        pool.close().await;
        tracing::info!(database = %self.config.database, "connection pool closed");
        Ok(())
    }
}

fn bind<'q>(statement: &'q str, params: &[&'q str]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(statement), |query, param| query.bind(*param))
}
