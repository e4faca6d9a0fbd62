use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;

use crate::domain::ContactRecord;

/// Durable side of the outreach ledger: the append-only messaged-sender set
/// and the contact cache.
#[derive(Clone)]
pub struct OutreachStore {
    pool: SqlitePool,
}

impl OutreachStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub async fn load_messaged(&self) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT user_id FROM messaged_users")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub async fn insert_messaged(&self, user_id: i64, messaged_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO messaged_users (user_id, messaged_at) VALUES (?1, ?2)")
            .bind(user_id)
            .bind(messaged_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn load_contacts(&self) -> Result<Vec<ContactRecord>> {
        let rows: Vec<(i64, Option<String>, String, String)> =
            sqlx::query_as("SELECT user_id, username, full_name, cached_at FROM contacts")
                .fetch_all(&self.pool)
                .await?;
        let mut records = Vec::with_capacity(rows.len());
        for (user_id, username, full_name, cached_at) in rows {
            let cached_at = DateTime::parse_from_rfc3339(&cached_at)
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or_else(|_| DateTime::<Utc>::MIN_UTC);
            records.push(ContactRecord {
                user_id,
                username,
                full_name,
                cached_at,
            });
        }
        Ok(records)
    }

    pub async fn upsert_contact(&self, record: &ContactRecord) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO contacts (user_id, username, full_name, cached_at)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(user_id) DO UPDATE SET
                   username = excluded.username,
                   full_name = excluded.full_name,
                   cached_at = excluded.cached_at"#,
        )
        .bind(record.user_id)
        .bind(record.username.as_deref())
        .bind(&record.full_name)
        .bind(record.cached_at.to_rfc3339())
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
    async fn messaged_set_round_trips() {
        let pool = init_memory_pool().await.expect("pool");
        let store = OutreachStore::new(pool);

        store.insert_messaged(42, Utc::now()).await.expect("insert");
        store.insert_messaged(42, Utc::now()).await.expect("duplicate insert is a no-op");
        store.insert_messaged(7, Utc::now()).await.expect("insert");

        let mut loaded = store.load_messaged().await.expect("load");
        loaded.sort_unstable();
        assert_eq!(loaded, vec![7, 42]);
    }

    #[tokio::test]
    async fn contact_upsert_replaces_and_round_trips() {
        let pool = init_memory_pool().await.expect("pool");
        let store = OutreachStore::new(pool);

        let cached_at = Utc::now();
        let mut record = ContactRecord {
            user_id: 9,
            username: Some("ada".into()),
            full_name: "Ada Lovelace".into(),
            cached_at,
        };
        store.upsert_contact(&record).await.expect("insert");

        record.username = None;
        store.upsert_contact(&record).await.expect("replace");

        let loaded = store.load_contacts().await.expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].user_id, 9);
        assert_eq!(loaded[0].username, None);
        assert_eq!(loaded[0].full_name, "Ada Lovelace");
        assert_eq!(loaded[0].cached_at.timestamp(), cached_at.timestamp());
    }
}
