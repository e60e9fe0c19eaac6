//! PostgreSQL implementation of the Marquee persistence boundary.
//!
//! One [`PgStore`] implements every store trait over a shared pool. Each
//! statement runs under the configured query timeout and fails with
//! [`StoreError::Timeout`] rather than waiting on a stuck connection.

mod movies;
mod permissions;
mod tokens;
mod users;

use marquee_core::{PoolStatus, StoreDiagnostics, StoreError};
use marquee_core::config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::time::Duration;

const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgStore {
    /// Open a pool and check the database answers within the connect timeout.
    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        if config.dsn.trim().is_empty() {
            anyhow::bail!("database dsn is empty (set --db-dsn or MARQUEE_DB_DSN)");
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .idle_timeout(config.idle_timeout)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.dsn)
            .await?;

        let ping = sqlx::query("SELECT 1").execute(&pool);
        tokio::time::timeout(config.connect_timeout, ping)
            .await
            .map_err(|_| {
                anyhow::anyhow!("database ping timed out after {:?}", config.connect_timeout)
            })??;

        tracing::info!(
            max_connections = config.max_connections,
            "database connection pool established"
        );
        Ok(Self::from_pool(pool, config.query_timeout))
    }

    pub fn from_pool(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Run one statement under the query timeout.
    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(map_sqlx_error),
            Err(_) => Err(StoreError::Timeout(self.query_timeout)),
        }
    }
}

impl StoreDiagnostics for PgStore {
    fn pool_status(&self) -> Option<PoolStatus> {
        let open = self.pool.size();
        let idle = self.pool.num_idle();
        Some(PoolStatus {
            max_open_connections: self.pool.options().get_max_connections(),
            open_connections: open,
            idle,
            in_use: open.saturating_sub(u32::try_from(idle).unwrap_or(u32::MAX)),
        })
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err
        && db.constraint() == Some(USERS_EMAIL_CONSTRAINT)
    {
        return StoreError::DuplicateEmail;
    }
    StoreError::backend(err)
}

/// Decode failure for a column whose SQL type is fine but whose value is not.
fn corrupt(column: &str, detail: impl std::fmt::Display) -> StoreError {
    StoreError::backend_msg(format!("unexpected value in column '{column}': {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lazy_store(query_timeout: Duration) -> Result<PgStore, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(3)
            .connect_lazy("postgres://localhost/none")?;
        Ok(PgStore::from_pool(pool, query_timeout))
    }

    #[tokio::test]
    async fn stuck_statement_fails_with_timeout() -> Result<(), sqlx::Error> {
        let store = lazy_store(Duration::from_millis(10))?;

        let result = store
            .bounded(std::future::pending::<Result<(), sqlx::Error>>())
            .await;

        match result {
            Err(StoreError::Timeout(after)) => assert_eq!(after, Duration::from_millis(10)),
            other => panic!("expected a timeout, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn driver_errors_pass_through_as_backend() -> Result<(), sqlx::Error> {
        let store = lazy_store(Duration::from_secs(1))?;

        let result = store
            .bounded(async { Err::<(), _>(sqlx::Error::RowNotFound) })
            .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
        Ok(())
    }

    #[tokio::test]
    async fn lazy_pool_reports_no_open_connections() -> Result<(), sqlx::Error> {
        let store = lazy_store(Duration::from_secs(1))?;

        let status = store.pool_status().expect("postgres reports pool status");
        assert_eq!(status.max_open_connections, 3);
        assert_eq!(status.open_connections, 0);
        assert_eq!(status.in_use, 0);
        Ok(())
    }
}
