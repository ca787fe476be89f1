mod error;
pub mod repos;
pub mod sqlite;

#[cfg(test)]
pub mod tests;

use std::sync::Arc;

pub use error::{DbError, DbResult};
pub use repos::*;

use crate::config::DatabaseConfig;

/// Repository trait objects, created once at startup.
struct CachedRepos {
    users: Arc<dyn UserRepo>,
    organizations: Arc<dyn OrganizationRepo>,
    projects: Arc<dyn ProjectRepo>,
    usage: Arc<dyn UsageEventRepo>,
}

/// Long-lived SQLite pool shared by all requests, plus cached repos.
/// Initialized once at process start and never torn down mid-request.
pub struct DbPool {
    pool: sqlx::SqlitePool,
    repos: CachedRepos,
}

impl DbPool {
    /// Wrap an existing pool. Primarily useful for testing.
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        let repos = CachedRepos {
            users: Arc::new(sqlite::SqliteUserRepo::new(pool.clone())),
            organizations: Arc::new(sqlite::SqliteOrganizationRepo::new(pool.clone())),
            projects: Arc::new(sqlite::SqliteProjectRepo::new(pool.clone())),
            usage: Arc::new(sqlite::SqliteUsageEventRepo::new(pool.clone())),
        };
        DbPool { pool, repos }
    }

    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(
                sqlx::sqlite::SqliteConnectOptions::new()
                    .filename(&config.path)
                    .create_if_missing(config.create_if_missing)
                    .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                    .foreign_keys(true),
            )
            .await?;
        Ok(Self::from_sqlite(pool))
    }

    /// Run migrations via sqlx's migration runner.
    pub async fn run_migrations(&self) -> DbResult<()> {
        tracing::info!("Running SQLite migrations");
        sqlx::migrate!("./migrations_sqlx/sqlite")
            .run(&self.pool)
            .await?;
        Ok(())
    }

    pub fn users(&self) -> Arc<dyn UserRepo> {
        Arc::clone(&self.repos.users)
    }

    pub fn organizations(&self) -> Arc<dyn OrganizationRepo> {
        Arc::clone(&self.repos.organizations)
    }

    pub fn projects(&self) -> Arc<dyn ProjectRepo> {
        Arc::clone(&self.repos.projects)
    }

    pub fn usage(&self) -> Arc<dyn UsageEventRepo> {
        Arc::clone(&self.repos.usage)
    }

    /// Reference to the underlying pool, for database-specific operations
    /// that need direct access.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Health check for database connectivity.
    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
