//! The outreach ledger: the record of who has been contacted and who is being
//! handled right now. `try_claim` / `release` / `commit` form the at-most-once
//! protocol every message handler must follow. The in-memory sets are
//! authoritative for the process lifetime; SQLite writes are best-effort and
//! a failed write is logged, never escalated.

use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use chrono::Utc;
use parking_lot::Mutex;

use crate::{
    db::outreach::OutreachStore,
    domain::ContactRecord,
    telegram::client::MessagingClient,
};

#[derive(Default)]
struct LedgerState {
    /// Senders with a completed outreach. Append-only.
    messaged: HashSet<i64>,
    /// Senders currently held by an active handler. Never persisted.
    in_flight: HashSet<i64>,
    contacts: HashMap<i64, ContactRecord>,
}

pub struct OutreachLedger {
    state: Mutex<LedgerState>,
    store: OutreachStore,
    contact_freshness: Duration,
}

impl OutreachLedger {
    /// Restores the durable ledger state from the store. In-flight claims are
    /// intentionally not restored; a restart re-evaluates them.
    pub async fn load(store: OutreachStore, contact_freshness: Duration) -> anyhow::Result<Self> {
        let messaged: HashSet<i64> = store.load_messaged().await?.into_iter().collect();
        let contacts: HashMap<i64, ContactRecord> = store
            .load_contacts()
            .await?
            .into_iter()
            .map(|record| (record.user_id, record))
            .collect();
        tracing::info!(
            target: "ledger",
            messaged = messaged.len(),
            contacts = contacts.len(),
            "outreach ledger loaded"
        );
        Ok(Self {
            state: Mutex::new(LedgerState {
                messaged,
                in_flight: HashSet::new(),
                contacts,
            }),
            store,
            contact_freshness,
        })
    }

    /// Atomic check-and-set: claims the sender unless already messaged or in
    /// flight. No suspension point sits between the check and the insert.
    pub fn try_claim(&self, sender_id: i64) -> bool {
        let mut state = self.state.lock();
        if state.messaged.contains(&sender_id) || state.in_flight.contains(&sender_id) {
            return false;
        }
        state.in_flight.insert(sender_id);
        true
    }

    /// Drops the in-flight claim. Called on every exit path of a handler.
    pub fn release(&self, sender_id: i64) {
        self.state.lock().in_flight.remove(&sender_id);
    }

    /// Records a completed outreach. Permanent; never reversed.
    pub async fn commit(&self, sender_id: i64) {
        let now = Utc::now();
        self.state.lock().messaged.insert(sender_id);
        if let Err(err) = self.store.insert_messaged(sender_id, now).await {
            tracing::warn!(
                target: "ledger",
                sender_id,
                error = %err,
                "failed to persist messaged sender; in-memory state remains authoritative"
            );
        }
    }

    pub fn is_messaged(&self, sender_id: i64) -> bool {
        self.state.lock().messaged.contains(&sender_id)
    }

    /// Cached contact details, refetched through the client when older than
    /// the freshness window. A fetch failure returns `None`; the caller still
    /// proceeds with outreach keyed by id.
    pub async fn resolve_contact(
        &self,
        client: &dyn MessagingClient,
        sender_id: i64,
    ) -> Option<ContactRecord> {
        let now = Utc::now();
        {
            let state = self.state.lock();
            if let Some(record) = state.contacts.get(&sender_id) {
                if record.is_fresh(self.contact_freshness, now) {
                    return Some(record.clone());
                }
            }
        }

        match client.resolve_user(sender_id).await {
            Ok(profile) => {
                let record = ContactRecord::from_profile(sender_id, &profile, now);
                self.state
                    .lock()
                    .contacts
                    .insert(sender_id, record.clone());
                if let Err(err) = self.store.upsert_contact(&record).await {
                    tracing::warn!(
                        target: "ledger",
                        sender_id,
                        error = %err,
                        "failed to persist contact record"
                    );
                }
                Some(record)
            }
            Err(err) => {
                tracing::warn!(
                    target: "ledger",
                    sender_id,
                    error = %err,
                    "could not fetch contact info; proceeding without a display name"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    };

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use super::*;
    use crate::{
        db::init_memory_pool,
        domain::UserProfile,
        telegram::client::{NoticeFormat, SendOptions},
    };

    struct StubClient {
        resolve_calls: AtomicUsize,
        fail_resolve: AtomicBool,
    }

    impl StubClient {
        fn new() -> Self {
            Self {
                resolve_calls: AtomicUsize::new(0),
                fail_resolve: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl MessagingClient for StubClient {
        fn self_id(&self) -> i64 {
            1
        }

        async fn resolve_user(&self, _user_id: i64) -> Result<UserProfile> {
            self.resolve_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_resolve.load(Ordering::SeqCst) {
                bail!("entity lookup failed");
            }
            Ok(UserProfile {
                username: Some("ada".into()),
                first_name: Some("Ada".into()),
                last_name: Some("Lovelace".into()),
            })
        }

        async fn send_direct(&self, _: i64, _: &str, _: SendOptions) -> Result<()> {
            Ok(())
        }

        async fn send_channel(&self, _: i64, _: &str, _: NoticeFormat) -> Result<()> {
            Ok(())
        }
    }

    async fn ledger() -> OutreachLedger {
        let pool = init_memory_pool().await.expect("pool");
        OutreachLedger::load(OutreachStore::new(pool), Duration::from_secs(3600))
            .await
            .expect("ledger")
    }

    #[tokio::test]
    async fn claim_release_commit_protocol() {
        let ledger = ledger().await;

        assert!(ledger.try_claim(5));
        // Second claim while in flight is refused.
        assert!(!ledger.try_claim(5));

        ledger.release(5);
        assert!(ledger.try_claim(5));

        ledger.commit(5).await;
        ledger.release(5);
        // Committed senders are never claimable again.
        assert!(!ledger.try_claim(5));
        assert!(ledger.is_messaged(5));
    }

    #[tokio::test]
    async fn committed_senders_survive_reload() {
        let pool = init_memory_pool().await.expect("pool");
        let store = OutreachStore::new(pool);

        let ledger = OutreachLedger::load(store.clone(), Duration::from_secs(3600))
            .await
            .expect("ledger");
        assert!(ledger.try_claim(77));
        ledger.commit(77).await;
        ledger.release(77);

        let reloaded = OutreachLedger::load(store, Duration::from_secs(3600))
            .await
            .expect("reload");
        assert!(!reloaded.try_claim(77));
    }

    #[tokio::test]
    async fn fresh_contact_skips_refetch() {
        let ledger = ledger().await;
        let client = StubClient::new();

        let first = ledger.resolve_contact(&client, 9).await.expect("record");
        assert_eq!(first.display_name(), "ada");
        assert_eq!(client.resolve_calls.load(Ordering::SeqCst), 1);

        ledger.resolve_contact(&client, 9).await.expect("cached");
        assert_eq!(client.resolve_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_contact_triggers_refetch() {
        let pool = init_memory_pool().await.expect("pool");
        let store = OutreachStore::new(pool);
        let stale = ContactRecord {
            user_id: 9,
            username: None,
            full_name: "Old Name".into(),
            cached_at: Utc::now() - chrono::Duration::hours(2),
        };
        store.upsert_contact(&stale).await.expect("seed");

        let ledger = OutreachLedger::load(store, Duration::from_secs(3600))
            .await
            .expect("ledger");
        let client = StubClient::new();

        let record = ledger.resolve_contact(&client, 9).await.expect("record");
        assert_eq!(client.resolve_calls.load(Ordering::SeqCst), 1);
        assert_eq!(record.display_name(), "ada");
    }

    #[tokio::test]
    async fn failed_fetch_returns_none() {
        let ledger = ledger().await;
        let client = StubClient::new();
        client.fail_resolve.store(true, Ordering::SeqCst);

        assert!(ledger.resolve_contact(&client, 9).await.is_none());
    }

    #[tokio::test]
    async fn interleaved_handlers_cannot_both_claim() {
        let ledger = Arc::new(ledger().await);
        // Two logical handlers racing for the same sender at a suspension
        // boundary: exactly one claim may succeed.
        let a = ledger.try_claim(33);
        let b = ledger.try_claim(33);
        assert!(a ^ b);
    }
}
