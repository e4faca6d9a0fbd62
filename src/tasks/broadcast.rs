//! Periodic group broadcast. An hourly cron tick checks when the last round
//! finished; once the minimum interval has passed, a random pitch goes out to
//! every monitored group with a per-group pacing delay.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::time::sleep;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::{
    config::AppConfig,
    db::broadcast::BroadcastStateRepo,
    pitch::PitchBook,
    telegram::client::{MessagingClient, NoticeFormat},
};

pub struct Broadcaster {
    client: Arc<dyn MessagingClient>,
    repo: BroadcastStateRepo,
    pitches: Arc<PitchBook>,
    config: Arc<AppConfig>,
}

impl Broadcaster {
    pub fn new(
        client: Arc<dyn MessagingClient>,
        repo: BroadcastStateRepo,
        pitches: Arc<PitchBook>,
        config: Arc<AppConfig>,
    ) -> Arc<Self> {
        Arc::new(Self {
            client,
            repo,
            pitches,
            config,
        })
    }

    pub async fn schedule(self: Arc<Self>) -> Result<JobScheduler> {
        let scheduler = JobScheduler::new().await?;
        let spec = self.config.broadcast.cron_spec.clone();
        let broadcaster = self.clone();
        let job = Job::new_async(spec.as_str(), move |_id, _lock| {
            let broadcaster = broadcaster.clone();
            Box::pin(async move {
                broadcaster.tick().await;
            })
        })?;
        scheduler.add(job).await?;
        scheduler.start().await?;
        tracing::info!(target: "broadcast", cron = %spec, "broadcast job scheduled");
        Ok(scheduler)
    }

    async fn tick(&self) {
        let now = Utc::now();
        let min_interval = chrono::Duration::from_std(self.config.broadcast.min_interval)
            .unwrap_or(chrono::Duration::MAX);

        match self.repo.last_round().await {
            Ok(Some(last)) if now.signed_duration_since(last) < min_interval => {
                tracing::debug!(target: "broadcast", last = %last, "round not due yet");
                return;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(target: "broadcast", error = %err, "could not read broadcast state");
                return;
            }
        }

        tracing::info!(target: "broadcast", "starting broadcast round");
        for &chat_id in &self.config.monitored_chat_ids {
            let pitch = self.pitches.random_pitch();
            if let Err(err) = self
                .client
                .send_channel(chat_id, &pitch, NoticeFormat::Plain)
                .await
            {
                tracing::warn!(
                    target: "broadcast",
                    chat_id,
                    error = %err,
                    "failed to send broadcast pitch"
                );
            } else {
                tracing::info!(target: "broadcast", chat_id, "broadcast pitch sent");
            }
            sleep(self.config.broadcast.per_group_delay).await;
        }

        if let Err(err) = self.repo.record_round(Utc::now()).await {
            tracing::warn!(target: "broadcast", error = %err, "failed to persist broadcast round");
        }
    }
}
