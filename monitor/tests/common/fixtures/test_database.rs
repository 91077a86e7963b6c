//! Test database utilities for in-memory SQLite testing

use anyhow::Result;
use monitor::Database;
use sqlx::sqlite::SqlitePoolOptions;

/// In-memory database with the production schema
pub struct TestDatabase {
    pub database: Database,
}

impl TestDatabase {
    pub async fn new() -> Result<Self> {
        // One connection, otherwise each connection gets its own in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self {
            database: Database::from_pool(pool).await?,
        })
    }

    pub async fn row_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM check_history")
            .fetch_one(self.database.pool())
            .await?;
        Ok(count)
    }
}
