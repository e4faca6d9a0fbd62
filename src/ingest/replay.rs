//! Startup replay: feeds messages that arrived while the process was down
//! through the same handler as live ingestion, oldest first, advancing the
//! checkpoint after each one. Runs to completion before live events are
//! consumed, so only one writer ever owns a channel's watermark.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    config::AppConfig,
    db::pending::PendingUpdateRepo,
    domain::InboundMessage,
    ingest::{
        checkpoint::CheckpointStore,
        handler::{HandleOutcome, IngestSource, MessageHandler},
    },
};

/// Channel history as the platform exposes it: messages at or after the
/// offset, oldest first.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_since(
        &self,
        chat_id: i64,
        offset: DateTime<Utc>,
    ) -> Result<Vec<InboundMessage>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayStats {
    pub scanned: usize,
    pub contacted: usize,
}

pub struct ReplayController {
    handler: Arc<MessageHandler>,
    checkpoints: Arc<CheckpointStore>,
    staging: PendingUpdateRepo,
    config: Arc<AppConfig>,
}

impl ReplayController {
    pub fn new(
        handler: Arc<MessageHandler>,
        checkpoints: Arc<CheckpointStore>,
        staging: PendingUpdateRepo,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            handler,
            checkpoints,
            staging,
            config,
        }
    }

    /// Replays every monitored channel. A failing channel is logged and
    /// skipped; it never blocks the others.
    pub async fn run(&self, history: &dyn HistorySource) {
        for &chat_id in &self.config.monitored_chat_ids {
            match self.replay_channel(history, chat_id).await {
                Ok(Some(stats)) => {
                    tracing::info!(
                        target: "replay",
                        chat_id,
                        scanned = stats.scanned,
                        contacted = stats.contacted,
                        "channel replay finished"
                    );
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::error!(
                        target: "replay",
                        chat_id,
                        error = %err,
                        "channel replay failed"
                    );
                }
            }
        }
    }

    /// `Ok(None)` means replay was skipped (no baseline, or gap too stale).
    async fn replay_channel(
        &self,
        history: &dyn HistorySource,
        chat_id: i64,
    ) -> Result<Option<ReplayStats>> {
        let Some(checkpoint) = self.checkpoints.get(chat_id) else {
            tracing::info!(target: "replay", chat_id, "no checkpoint, skipping replay");
            self.discard_staged_channel(chat_id).await;
            return Ok(None);
        };

        let now = Utc::now();
        let max_gap = chrono::Duration::from_std(self.config.replay.max_gap)
            .unwrap_or(chrono::Duration::MAX);
        if now.signed_duration_since(checkpoint) > max_gap {
            tracing::info!(
                target: "replay",
                chat_id,
                checkpoint = %checkpoint,
                "gap exceeds staleness bound, skipping replay"
            );
            self.discard_staged_channel(chat_id).await;
            return Ok(None);
        }

        // Scan from slightly before the checkpoint to tolerate clock skew at
        // the platform boundary; the strict > filter below restores exactness.
        let skew = chrono::Duration::from_std(self.config.replay.boundary_skew)
            .unwrap_or_else(|_| chrono::Duration::seconds(10));
        let offset = checkpoint - skew;

        let mut messages = history.fetch_since(chat_id, offset).await?;
        messages.sort_by_key(|msg| msg.timestamp);

        let mut stats = ReplayStats::default();
        for msg in &messages {
            if msg.timestamp <= checkpoint {
                self.clear_staged(msg).await;
                continue;
            }
            stats.scanned += 1;
            let outcome = self.handler.handle(msg, IngestSource::Replay).await;
            if outcome == HandleOutcome::Contacted {
                stats.contacted += 1;
            }
            // The staged copy has served its purpose; the checkpoint now
            // covers this message.
            self.clear_staged(msg).await;
        }
        Ok(Some(stats))
    }

    async fn clear_staged(&self, msg: &InboundMessage) {
        if let Err(err) = self.staging.delete(msg.chat_id, msg.message_id).await {
            tracing::warn!(
                target: "replay",
                chat_id = msg.chat_id,
                message_id = msg.message_id,
                error = %err,
                "failed to clear staged update"
            );
        }
    }

    async fn discard_staged_channel(&self, chat_id: i64) {
        if let Err(err) = self.staging.delete_channel(chat_id).await {
            tracing::warn!(
                target: "replay",
                chat_id,
                error = %err,
                "failed to discard staged updates"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        domain::IntentLabel,
        ingest::testutil::{employer_json, message, TestRig},
    };

    struct FixedHistory {
        messages: Mutex<Vec<InboundMessage>>,
    }

    impl FixedHistory {
        fn new(messages: Vec<InboundMessage>) -> Self {
            Self {
                messages: Mutex::new(messages),
            }
        }
    }

    #[async_trait]
    impl HistorySource for FixedHistory {
        async fn fetch_since(
            &self,
            chat_id: i64,
            offset: DateTime<Utc>,
        ) -> Result<Vec<InboundMessage>> {
            Ok(self
                .messages
                .lock()
                .iter()
                .filter(|msg| msg.chat_id == chat_id && msg.timestamp >= offset)
                .cloned()
                .collect())
        }
    }

    const HIRING: &str = "We are hiring, must have java, DM to apply";

    fn controller(rig: &TestRig) -> ReplayController {
        ReplayController::new(
            rig.handler.clone(),
            rig.checkpoints.clone(),
            rig.pending.clone(),
            rig.config.clone(),
        )
    }

    #[tokio::test]
    async fn replays_only_messages_after_checkpoint() {
        let rig = TestRig::new(IntentLabel::Skip, Some(employer_json())).await;
        let checkpoint = Utc::now() - chrono::Duration::minutes(30);
        rig.checkpoints.advance(-100, checkpoint).await;

        let before = message(-100, 1, 601, checkpoint - chrono::Duration::seconds(5), HIRING);
        let at = message(-100, 2, 602, checkpoint, HIRING);
        let after = message(-100, 3, 603, checkpoint + chrono::Duration::minutes(1), HIRING);
        let history = FixedHistory::new(vec![after.clone(), before, at]);

        controller(&rig).run(&history).await;

        // Only the strictly-newer message was handled.
        assert_eq!(rig.client.sent_directs().len(), 1);
        assert_eq!(rig.client.sent_directs()[0].0, 603);
        assert_eq!(rig.checkpoints.get(-100), Some(after.timestamp));
    }

    #[tokio::test]
    async fn missing_checkpoint_skips_channel() {
        let rig = TestRig::new(IntentLabel::Skip, Some(employer_json())).await;
        let history = FixedHistory::new(vec![message(-100, 1, 601, Utc::now(), HIRING)]);

        controller(&rig).run(&history).await;
        assert!(rig.client.sent_directs().is_empty());
        assert_eq!(rig.checkpoints.get(-100), None);
    }

    #[tokio::test]
    async fn stale_gap_skips_channel() {
        let rig = TestRig::new(IntentLabel::Skip, Some(employer_json())).await;
        let checkpoint = Utc::now() - chrono::Duration::hours(13);
        rig.checkpoints.advance(-100, checkpoint).await;
        let history = FixedHistory::new(vec![message(
            -100,
            1,
            601,
            checkpoint + chrono::Duration::minutes(1),
            HIRING,
        )]);

        controller(&rig).run(&history).await;
        assert!(rig.client.sent_directs().is_empty());
        assert_eq!(rig.checkpoints.get(-100), Some(checkpoint));
    }

    #[tokio::test]
    async fn double_replay_is_idempotent() {
        let rig = TestRig::new(IntentLabel::Skip, Some(employer_json())).await;
        let checkpoint = Utc::now() - chrono::Duration::minutes(30);
        rig.checkpoints.advance(-100, checkpoint).await;

        let first = message(-100, 1, 601, checkpoint + chrono::Duration::minutes(1), HIRING);
        let second = message(-100, 2, 602, checkpoint + chrono::Duration::minutes(2), HIRING);
        let history = FixedHistory::new(vec![first, second.clone()]);

        let controller = controller(&rig);
        controller.run(&history).await;
        let after_first = rig.checkpoints.get(-100);

        // Crash-and-restart simulation: same range replayed again.
        controller.run(&history).await;

        assert_eq!(rig.client.sent_directs().len(), 2);
        assert_eq!(rig.checkpoints.get(-100), after_first);
        assert_eq!(rig.checkpoints.get(-100), Some(second.timestamp));
    }

    #[tokio::test]
    async fn staged_updates_survive_partial_replay_and_finish_on_restart() {
        let rig = TestRig::new(IntentLabel::Skip, Some(employer_json())).await;
        let checkpoint = Utc::now() - chrono::Duration::minutes(30);
        rig.checkpoints.advance(-100, checkpoint).await;

        let first = message(-100, 1, 601, checkpoint + chrono::Duration::minutes(1), HIRING);
        let second = message(-100, 2, 602, checkpoint + chrono::Duration::minutes(2), HIRING);
        let third = message(-100, 3, 603, checkpoint + chrono::Duration::minutes(3), HIRING);
        rig.pending
            .insert_batch(&[first.clone(), second.clone(), third.clone()])
            .await
            .expect("stage");

        // First run dies after handling only the first message: its history
        // never got past it.
        controller(&rig)
            .run(&FixedHistory::new(vec![first.clone()]))
            .await;
        assert_eq!(rig.client.sent_directs().len(), 1);
        assert_eq!(rig.pending.load_all().await.expect("load").len(), 2);

        // On restart the server queue is empty; the backlog is whatever is
        // still staged.
        let recovered = rig.pending.load_all().await.expect("load");
        controller(&rig).run(&FixedHistory::new(recovered)).await;

        assert_eq!(rig.client.sent_directs().len(), 3);
        assert_eq!(rig.checkpoints.get(-100), Some(third.timestamp));
        assert!(rig.pending.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn skipped_channels_discard_their_staged_updates() {
        let rig = TestRig::new(IntentLabel::Skip, Some(employer_json())).await;
        // No checkpoint for -100; stale checkpoint for -200.
        rig.checkpoints
            .advance(-200, Utc::now() - chrono::Duration::hours(13))
            .await;
        rig.pending
            .insert_batch(&[
                message(-100, 1, 601, Utc::now(), HIRING),
                message(-200, 1, 602, Utc::now(), HIRING),
            ])
            .await
            .expect("stage");

        controller(&rig).run(&FixedHistory::new(Vec::new())).await;
        assert!(rig.client.sent_directs().is_empty());
        assert!(rig.pending.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn one_channel_failure_does_not_block_others() {
        struct FlakyHistory {
            inner: FixedHistory,
        }

        #[async_trait]
        impl HistorySource for FlakyHistory {
            async fn fetch_since(
                &self,
                chat_id: i64,
                offset: DateTime<Utc>,
            ) -> Result<Vec<InboundMessage>> {
                if chat_id == -100 {
                    anyhow::bail!("history unavailable");
                }
                self.inner.fetch_since(chat_id, offset).await
            }
        }

        let rig = TestRig::new(IntentLabel::Skip, Some(employer_json())).await;
        let checkpoint = Utc::now() - chrono::Duration::minutes(30);
        rig.checkpoints.advance(-100, checkpoint).await;
        rig.checkpoints.advance(-200, checkpoint).await;

        let history = FlakyHistory {
            inner: FixedHistory::new(vec![message(
                -200,
                1,
                601,
                checkpoint + chrono::Duration::minutes(1),
                HIRING,
            )]),
        };

        controller(&rig).run(&history).await;
        assert_eq!(rig.client.sent_directs().len(), 1);
    }
}
