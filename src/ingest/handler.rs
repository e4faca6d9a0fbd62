//! The single handle-one-message operation shared by live ingestion and
//! startup replay. Both paths run the identical claim → cascade → outreach →
//! commit → checkpoint sequence; only logging and pacing differ by source.

use std::sync::Arc;

use rand::Rng;
use tokio::time::{sleep, Duration};

use crate::{
    classifier::IntentCascade,
    config::AppConfig,
    domain::{InboundMessage, IntentLabel},
    infrastructure::notifier,
    ingest::checkpoint::CheckpointStore,
    ledger::OutreachLedger,
    telegram::client::{MessagingClient, ReplyRef, SendOptions},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestSource {
    Live,
    Replay,
}

impl IngestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Replay => "replay",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Message authored by the bot account itself.
    OwnMessage,
    /// Sender already messaged or currently held by another handler.
    AlreadyHandled,
    /// Terminal non-employer verdict; the sender stays contactable.
    NotEmployer(IntentLabel),
    /// Outreach DM dispatched and committed.
    Contacted,
    /// Outreach dispatch failed; claim released, no commit, no retry of this
    /// message.
    DispatchFailed,
}

pub struct MessageHandler {
    client: Arc<dyn MessagingClient>,
    cascade: IntentCascade,
    ledger: Arc<OutreachLedger>,
    checkpoints: Arc<CheckpointStore>,
    config: Arc<AppConfig>,
}

impl MessageHandler {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        cascade: IntentCascade,
        ledger: Arc<OutreachLedger>,
        checkpoints: Arc<CheckpointStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            client,
            cascade,
            ledger,
            checkpoints,
            config,
        }
    }

    /// Handles one message end to end. The checkpoint advances once handling
    /// has completed, whatever the outcome, so a restart never reprocesses a
    /// finished message.
    pub async fn handle(&self, msg: &InboundMessage, source: IngestSource) -> HandleOutcome {
        if msg.sender_id == self.client.self_id() {
            self.checkpoints.advance(msg.chat_id, msg.timestamp).await;
            return HandleOutcome::OwnMessage;
        }

        if !self.ledger.try_claim(msg.sender_id) {
            tracing::debug!(
                target: "ingest",
                source = source.as_str(),
                sender_id = msg.sender_id,
                "sender already messaged or in flight, skipping"
            );
            self.checkpoints.advance(msg.chat_id, msg.timestamp).await;
            return HandleOutcome::AlreadyHandled;
        }

        let outcome = self.evaluate(msg, source).await;
        self.ledger.release(msg.sender_id);
        self.checkpoints.advance(msg.chat_id, msg.timestamp).await;
        outcome
    }

    async fn evaluate(&self, msg: &InboundMessage, source: IngestSource) -> HandleOutcome {
        let verdict = self.cascade.classify(&msg.text).await;
        if verdict.label != IntentLabel::Employer {
            tracing::debug!(
                target: "ingest",
                source = source.as_str(),
                sender_id = msg.sender_id,
                label = %verdict.label,
                reason = verdict.reason.as_deref().unwrap_or("-"),
                "no outreach for this verdict"
            );
            return HandleOutcome::NotEmployer(verdict.label);
        }

        // Tier 3 guarantees a reply for employer verdicts; refuse outreach if
        // that invariant is ever broken upstream.
        let Some(reply) = verdict.reply else {
            tracing::warn!(
                target: "ingest",
                sender_id = msg.sender_id,
                "employer verdict arrived without a reply, treating as unclear"
            );
            return HandleOutcome::NotEmployer(IntentLabel::Unclear);
        };

        tracing::info!(
            target: "ingest",
            source = source.as_str(),
            chat_id = msg.chat_id,
            sender_id = msg.sender_id,
            text = %msg.preview(),
            "employer message confirmed"
        );

        // A missing contact record only costs us the display name.
        let contact = self
            .ledger
            .resolve_contact(self.client.as_ref(), msg.sender_id)
            .await;

        let delay = match source {
            IngestSource::Live => self.config.outreach.live_delay_secs,
            IngestSource::Replay => self.config.outreach.replay_delay_secs,
        };
        paced_delay(delay).await;

        let options = SendOptions {
            reply_to: Some(ReplyRef {
                chat_id: msg.chat_id,
                message_id: msg.message_id,
            }),
        };
        match self.client.send_direct(msg.sender_id, &reply, options).await {
            Ok(()) => {
                self.ledger.commit(msg.sender_id).await;
                paced_delay(self.config.outreach.report_delay_secs).await;
                notifier::report_outreach(
                    self.client.as_ref(),
                    &self.config,
                    msg.sender_id,
                    &msg.text,
                    true,
                )
                .await;
                let name = contact
                    .as_ref()
                    .map(|c| c.display_name().to_string())
                    .unwrap_or_else(|| msg.sender_id.to_string());
                tracing::info!(
                    target: "ingest",
                    source = source.as_str(),
                    sender_id = msg.sender_id,
                    name = %name,
                    "outreach message sent"
                );
                HandleOutcome::Contacted
            }
            Err(err) => {
                tracing::warn!(
                    target: "ingest",
                    source = source.as_str(),
                    sender_id = msg.sender_id,
                    error = %err,
                    "outreach dispatch failed, sender stays eligible"
                );
                notifier::report_outreach(
                    self.client.as_ref(),
                    &self.config,
                    msg.sender_id,
                    &msg.text,
                    false,
                )
                .await;
                HandleOutcome::DispatchFailed
            }
        }
    }
}

/// Human-like pacing. The range is inclusive; (0, 0) disables the delay.
async fn paced_delay((min, max): (u64, u64)) {
    if max == 0 {
        return;
    }
    let secs = {
        let mut rng = rand::thread_rng();
        rng.gen_range(min..=max)
    };
    sleep(Duration::from_secs(secs)).await;
}
