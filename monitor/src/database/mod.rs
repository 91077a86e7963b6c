//! Database layer for the validator monitor.
//!
//! SQLite persistence for per-tick check history. The authoritative
//! validator state lives in the JSON state store; this table only feeds the
//! history endpoint and is pruned by the retention job.
//!
//! - `records` - record types
//! - `history` - check history operations

mod history;
mod records;

pub use records::*;

use anyhow::Result;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;
use tracing::{error, info};

pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Expose pool for integration test queries
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        info!("Database path: {}", database_path);

        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("FAILED to create parent directory {:?}: {}", parent, e);
                    return Err(e.into());
                }
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        let pool = match SqlitePool::connect(&database_url).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("FAILED to connect to database {}: {}", database_url, e);
                return Err(e.into());
            }
        };

        let database = Self::from_pool(pool).await?;
        info!("Database initialized");
        Ok(database)
    }

    /// Wrap an existing pool and create the schema
    pub async fn from_pool(pool: Pool<Sqlite>) -> Result<Self> {
        let database = Self { pool };
        database.initialize_tables().await?;
        Ok(database)
    }

    async fn initialize_tables(&self) -> Result<()> {
        let history_table_sql = r#"
            CREATE TABLE IF NOT EXISTS check_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                validator TEXT NOT NULL,
                verdict TEXT NOT NULL,
                consecutive_failures INTEGER NOT NULL,
                height INTEGER,
                peers INTEGER,
                cpu_pct REAL,
                mem_pct REAL,
                disk_pct REAL,
                in_active_set BOOLEAN,
                timestamp DATETIME NOT NULL
            )
        "#;

        if let Err(e) = sqlx::query(history_table_sql).execute(&self.pool).await {
            error!("FAILED to create check_history table: {}", e);
            return Err(e.into());
        }

        let history_index_sql = "CREATE INDEX IF NOT EXISTS idx_check_history_validator_timestamp ON check_history(validator, timestamp DESC)";
        if let Err(e) = sqlx::query(history_index_sql).execute(&self.pool).await {
            error!("FAILED to create check_history index: {}", e);
            return Err(e.into());
        }

        Ok(())
    }
}
