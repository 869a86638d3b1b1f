//! Database module for the hospital backend
//!
//! This module owns the connection pool and the schema bootstrap.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

pub mod schema;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database connection pool
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection, creating the file if needed.
    ///
    /// A writer that finds the database locked waits up to `BUSY_TIMEOUT`
    /// before failing.
    pub async fn connect(connection_string: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(connection_string)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        info!("Connected to database");
        Ok(Self { pool })
    }

    /// Private in-memory database with the schema already applied.
    ///
    /// Pinned to one connection: every SQLite memory connection is its own
    /// database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.initialize_schema().await?;
        Ok(db)
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and constraints if they don't exist
    pub async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        for statement in schema::STATEMENTS {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!(tables = schema::STATEMENTS.len(), "Schema ready");
        Ok(())
    }
}
