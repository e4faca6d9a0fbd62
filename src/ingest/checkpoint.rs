//! Per-channel watermark of the most recently fully-processed message.
//! Advances are monotonic and persisted immediately, which is what makes
//! replay after a crash resume from the last completed message.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::db::checkpoint::CheckpointRepo;

pub struct CheckpointStore {
    entries: Mutex<HashMap<i64, DateTime<Utc>>>,
    repo: CheckpointRepo,
}

impl CheckpointStore {
    pub async fn load(repo: CheckpointRepo) -> anyhow::Result<Self> {
        let entries: HashMap<i64, DateTime<Utc>> = repo.load_all().await?.into_iter().collect();
        tracing::info!(target: "checkpoint", channels = entries.len(), "checkpoints loaded");
        Ok(Self {
            entries: Mutex::new(entries),
            repo,
        })
    }

    pub fn get(&self, chat_id: i64) -> Option<DateTime<Utc>> {
        self.entries.lock().get(&chat_id).copied()
    }

    /// Advances the watermark for a channel. Regressions are ignored, so the
    /// observed sequence of values is non-decreasing. Persist failures are
    /// logged; memory stays authoritative.
    pub async fn advance(&self, chat_id: i64, timestamp: DateTime<Utc>) {
        {
            let mut entries = self.entries.lock();
            match entries.get(&chat_id) {
                Some(current) if *current >= timestamp => return,
                _ => entries.insert(chat_id, timestamp),
            };
        }
        if let Err(err) = self.repo.upsert(chat_id, timestamp).await {
            tracing::warn!(
                target: "checkpoint",
                chat_id,
                error = %err,
                "failed to persist checkpoint"
            );
        }
    }

    /// Writes every in-memory entry back out; called on shutdown.
    pub async fn flush(&self) {
        let snapshot: Vec<(i64, DateTime<Utc>)> =
            self.entries.lock().iter().map(|(k, v)| (*k, *v)).collect();
        for (chat_id, timestamp) in snapshot {
            if let Err(err) = self.repo.upsert(chat_id, timestamp).await {
                tracing::warn!(
                    target: "checkpoint",
                    chat_id,
                    error = %err,
                    "failed to flush checkpoint"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_pool;

    async fn store() -> (CheckpointStore, CheckpointRepo) {
        let pool = init_memory_pool().await.expect("pool");
        let repo = CheckpointRepo::new(pool);
        let store = CheckpointStore::load(repo.clone()).await.expect("store");
        (store, repo)
    }

    #[tokio::test]
    async fn advance_is_monotonic() {
        let (store, _) = store().await;
        let base = Utc::now();

        store.advance(-1, base).await;
        store.advance(-1, base - chrono::Duration::seconds(30)).await;
        assert_eq!(store.get(-1), Some(base));

        let later = base + chrono::Duration::seconds(30);
        store.advance(-1, later).await;
        assert_eq!(store.get(-1), Some(later));
    }

    #[tokio::test]
    async fn advance_persists_immediately() {
        let (store, repo) = store().await;
        let base = Utc::now();
        store.advance(-5, base).await;

        let reloaded = CheckpointStore::load(repo).await.expect("reload");
        assert_eq!(
            reloaded.get(-5).map(|ts| ts.timestamp()),
            Some(base.timestamp())
        );
    }

    #[tokio::test]
    async fn channels_are_independent() {
        let (store, _) = store().await;
        let base = Utc::now();
        store.advance(-1, base).await;
        assert_eq!(store.get(-2), None);
    }
}
