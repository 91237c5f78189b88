//! Database layer for Folio Alerts
//!
//! SQLite connection pool, embedded migrations and the user and summary
//! repositories. Alert and notification storage lives in
//! [`crate::alerting::AlertRepository`].

mod summaries;
mod users;

pub use summaries::SummaryRepository;
pub use users::{CascadeReport, UserRepository};

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::alerting::AlertRepository;
use crate::config::DatabaseConfig;
use crate::error::Result;

/// SQLite connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect using the configured URL, creating the database file if needed
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// A private in-memory database with migrations applied.
    ///
    /// Held on a single connection that never expires, since every SQLite
    /// memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Get the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// User repository over this pool
    pub fn users(&self) -> UserRepository {
        UserRepository::new(self.pool.clone())
    }

    /// Alert and notification repository over this pool
    pub fn alerts(&self) -> AlertRepository {
        AlertRepository::new(self.pool.clone())
    }

    /// Portfolio summary repository over this pool
    pub fn summaries(&self) -> SummaryRepository {
        SummaryRepository::new(self.pool.clone())
    }
}

/// Map a stored enum column back to its variant
pub(crate) fn parse_column<T>(table: &str, column: &str, value: &str) -> Result<T>
where
    T: FromStr<Err = crate::models::ParseEnumError>,
{
    value.parse().map_err(|e| {
        crate::error::Error::internal(format!("corrupt {table}.{column}: {e}"))
    })
}
