use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

/// Durable per-channel watermark map. Timestamps are stored as RFC 3339 text
/// so the values stay sortable and round-trip losslessly.
#[derive(Clone)]
pub struct CheckpointRepo {
    pool: SqlitePool,
}

impl CheckpointRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn load_all(&self) -> Result<Vec<(i64, DateTime<Utc>)>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT chat_id, last_processed FROM checkpoints")
                .fetch_all(&self.pool)
                .await?;
        let mut entries = Vec::with_capacity(rows.len());
        for (chat_id, raw) in rows {
            match DateTime::parse_from_rfc3339(&raw) {
                Ok(ts) => entries.push((chat_id, ts.with_timezone(&Utc))),
                Err(err) => {
                    tracing::warn!(
                        target: "db",
                        chat_id,
                        value = %raw,
                        error = %err,
                        "discarding unparseable checkpoint"
                    );
                }
            }
        }
        Ok(entries)
    }

    pub async fn upsert(&self, chat_id: i64, last_processed: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO checkpoints (chat_id, last_processed) VALUES (?1, ?2)
               ON CONFLICT(chat_id) DO UPDATE SET last_processed = excluded.last_processed"#,
        )
        .bind(chat_id)
        .bind(last_processed.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    #[tokio::test]
    async fn upsert_and_load_round_trips() {
        let pool = init_memory_pool().await.expect("pool");
        let repo = CheckpointRepo::new(pool);

        let first = Utc::now();
        repo.upsert(-100, first).await.expect("insert");
        let later = first + chrono::Duration::minutes(5);
        repo.upsert(-100, later).await.expect("update");
        repo.upsert(-200, first).await.expect("insert second");

        let mut loaded = repo.load_all().await.expect("load");
        loaded.sort_by_key(|(chat_id, _)| *chat_id);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, -200);
        assert_eq!(loaded[1].0, -100);
        assert_eq!(loaded[1].1.timestamp(), later.timestamp());
    }
}
