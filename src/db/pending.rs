use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::domain::InboundMessage;

/// Staging area for drained updates. A row lives from the moment the update
/// is acknowledged to Telegram until replay has fully handled it; a crash in
/// between leaves the row behind, so the next startup can rebuild its backlog
/// from here instead of from the (already confirmed) server queue.
#[derive(Clone)]
pub struct PendingUpdateRepo {
    pool: SqlitePool,
}

impl PendingUpdateRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert_batch(&self, messages: &[InboundMessage]) -> Result<()> {
        for msg in messages {
            sqlx::query(
                r#"INSERT OR IGNORE INTO pending_updates
                   (chat_id, message_id, sender_id, observed_at, text)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
            )
            .bind(msg.chat_id)
            .bind(msg.message_id)
            .bind(msg.sender_id)
            .bind(msg.timestamp.to_rfc3339())
            .bind(&msg.text)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    pub async fn load_all(&self) -> Result<Vec<InboundMessage>> {
        let rows: Vec<(i64, i32, i64, String, String)> = sqlx::query_as(
            "SELECT chat_id, message_id, sender_id, observed_at, text FROM pending_updates",
        )
        .fetch_all(&self.pool)
        .await?;
        let mut messages = Vec::with_capacity(rows.len());
        for (chat_id, message_id, sender_id, observed_at, text) in rows {
            match DateTime::parse_from_rfc3339(&observed_at) {
                Ok(ts) => messages.push(InboundMessage {
                    chat_id,
                    message_id,
                    sender_id,
                    timestamp: ts.with_timezone(&Utc),
                    text,
                }),
                Err(err) => {
                    tracing::warn!(
                        target: "db",
                        chat_id,
                        message_id,
                        error = %err,
                        "discarding pending update with unparseable timestamp"
                    );
                }
            }
        }
        Ok(messages)
    }

    pub async fn delete(&self, chat_id: i64, message_id: i32) -> Result<()> {
        sqlx::query("DELETE FROM pending_updates WHERE chat_id = ?1 AND message_id = ?2")
            .bind(chat_id)
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_channel(&self, chat_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM pending_updates WHERE chat_id = ?1")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    fn message(chat_id: i64, message_id: i32) -> InboundMessage {
        InboundMessage {
            chat_id,
            message_id,
            sender_id: 42,
            timestamp: Utc::now(),
            text: "hello".into(),
        }
    }

    #[tokio::test]
    async fn batch_round_trips_and_deduplicates() {
        let pool = init_memory_pool().await.expect("pool");
        let repo = PendingUpdateRepo::new(pool);

        repo.insert_batch(&[message(-100, 1), message(-100, 2)])
            .await
            .expect("insert");
        // Re-staging the same page is a no-op.
        repo.insert_batch(&[message(-100, 1)]).await.expect("duplicate");

        let loaded = repo.load_all().await.expect("load");
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn delete_removes_single_rows_and_whole_channels() {
        let pool = init_memory_pool().await.expect("pool");
        let repo = PendingUpdateRepo::new(pool);
        repo.insert_batch(&[message(-100, 1), message(-100, 2), message(-200, 1)])
            .await
            .expect("insert");

        repo.delete(-100, 1).await.expect("delete row");
        assert_eq!(repo.load_all().await.expect("load").len(), 2);

        repo.delete_channel(-100).await.expect("delete channel");
        let remaining = repo.load_all().await.expect("load");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].chat_id, -200);
    }
}
