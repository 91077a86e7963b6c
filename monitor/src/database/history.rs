//! Check history database operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::{debug, error, info};

use super::records::CheckRecord;
use super::Database;

impl Database {
    pub async fn store_check_record(&self, record: &CheckRecord) -> Result<()> {
        match sqlx::query(
            r#"
            INSERT INTO check_history (
                validator, verdict, consecutive_failures, height, peers,
                cpu_pct, mem_pct, disk_pct, in_active_set, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.validator)
        .bind(&record.verdict)
        .bind(record.consecutive_failures)
        .bind(record.height)
        .bind(record.peers)
        .bind(record.cpu_pct)
        .bind(record.mem_pct)
        .bind(record.disk_pct)
        .bind(record.in_active_set)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        {
            Ok(_) => {
                debug!("Check record stored for: {}", record.validator);
                Ok(())
            }
            Err(e) => {
                error!("Failed to store check record for {}: {}", record.validator, e);
                Err(e.into())
            }
        }
    }

    /// Most recent records first
    pub async fn get_check_history(&self, validator: &str, limit: u32) -> Result<Vec<CheckRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT validator, verdict, consecutive_failures, height, peers,
                   cpu_pct, mem_pct, disk_pct, in_active_set, timestamp
            FROM check_history
            WHERE validator = ?
            ORDER BY timestamp DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(validator)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(CheckRecord {
                validator: row.try_get("validator")?,
                verdict: row.try_get("verdict")?,
                consecutive_failures: row.try_get("consecutive_failures")?,
                height: row.try_get("height")?,
                peers: row.try_get("peers")?,
                cpu_pct: row.try_get("cpu_pct")?,
                mem_pct: row.try_get("mem_pct")?,
                disk_pct: row.try_get("disk_pct")?,
                in_active_set: row.try_get("in_active_set")?,
                timestamp: row.try_get("timestamp")?,
            });
        }
        debug!("Loaded {} history records for {}", records.len(), validator);
        Ok(records)
    }

    /// Delete records older than the cutoff; returns the number removed
    pub async fn prune_history(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM check_history WHERE timestamp < ?")
            .bind(older_than)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!("Pruned {} check history records older than {}", removed, older_than);
        }
        Ok(removed)
    }
}
