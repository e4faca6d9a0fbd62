use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// Timestamp of the last completed broadcast round; a single-row table.
#[derive(Clone)]
pub struct BroadcastStateRepo {
    pool: SqlitePool,
}

impl BroadcastStateRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn last_round(&self) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT last_round FROM broadcast_state WHERE id = 0")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.and_then(|(raw,)| {
            DateTime::parse_from_rfc3339(&raw)
                .ok()
                .map(|ts| ts.with_timezone(&Utc))
        }))
    }

    pub async fn record_round(&self, finished_at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO broadcast_state (id, last_round) VALUES (0, ?1)
               ON CONFLICT(id) DO UPDATE SET last_round = excluded.last_round"#,
        )
        .bind(finished_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
