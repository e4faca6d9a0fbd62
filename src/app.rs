use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use reqwest::Client;
use teloxide::prelude::*;
use tokio::{sync::mpsc, time::timeout};
use tokio_cron_scheduler::JobScheduler;

use crate::{
    classifier::{ChatCompletionsBackend, IntentCascade, LlmConfirmer, TfidfIntentModel},
    config::AppConfig,
    db::{
        self, broadcast::BroadcastStateRepo, checkpoint::CheckpointRepo, outreach::OutreachStore,
        pending::PendingUpdateRepo,
    },
    infrastructure::{directories::ResolvedPaths, notifier, shutdown::Shutdown},
    ingest::{CheckpointStore, IngestCoordinator, MessageHandler, ReplayController},
    ledger::OutreachLedger,
    pitch::PitchBook,
    tasks::Broadcaster,
    telegram::{drain_backlog, BotClient, LiveListener, MessagingClient},
};

pub struct HireWatchApp {
    _paths: ResolvedPaths,
    bot: Bot,
    client: Arc<dyn MessagingClient>,
    handler: Arc<MessageHandler>,
    checkpoints: Arc<CheckpointStore>,
    pending: PendingUpdateRepo,
    outreach_store: OutreachStore,
    broadcaster: Arc<Broadcaster>,
    shutdown: Shutdown,
    config: Arc<AppConfig>,
}

impl HireWatchApp {
    pub async fn initialize(
        config: AppConfig,
        paths: ResolvedPaths,
        shutdown: Shutdown,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let pool = db::init_pool(&paths.db_path).await?;
        let outreach_store = OutreachStore::new(pool.clone());

        // Startup-fatal: a missing or malformed model asset aborts here.
        let model = Arc::new(
            TfidfIntentModel::load(&config.model.asset_path)
                .context("statistical intent model is required at startup")?,
        );

        let http_client = Client::builder()
            .user_agent(format!("hirewatch/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let confirmer = LlmConfirmer::new(
            Arc::new(ChatCompletionsBackend::new(
                http_client.clone(),
                config.llm.primary.clone(),
            )),
            Arc::new(ChatCompletionsBackend::new(
                http_client,
                config.llm.fallback.clone(),
            )),
        );
        let cascade = IntentCascade::new(model, confirmer);

        let ledger = Arc::new(
            OutreachLedger::load(outreach_store.clone(), config.outreach.contact_freshness)
                .await?,
        );
        let checkpoints = Arc::new(CheckpointStore::load(CheckpointRepo::new(pool.clone())).await?);
        let pending = PendingUpdateRepo::new(pool.clone());

        let bot = Bot::new(&config.telegram_bot_token);
        // Startup-fatal: no point continuing without platform authentication.
        let client: Arc<dyn MessagingClient> = Arc::new(BotClient::connect(bot.clone()).await?);

        let handler = Arc::new(MessageHandler::new(
            client.clone(),
            cascade,
            ledger,
            checkpoints.clone(),
            config.clone(),
        ));

        let pitches = Arc::new(PitchBook::load(&config.broadcast.pitches_path));
        let broadcaster = Broadcaster::new(
            client.clone(),
            BroadcastStateRepo::new(pool),
            pitches,
            config.clone(),
        );

        Ok(Self {
            _paths: paths,
            bot,
            client,
            handler,
            checkpoints,
            pending,
            outreach_store,
            broadcaster,
            shutdown,
            config,
        })
    }

    pub async fn run(self) -> Result<()> {
        tracing::info!("hirewatch starting");
        notifier::notify_report_chat(
            self.client.as_ref(),
            &self.config,
            "hirewatch started, listening to group chats.",
        )
        .await;

        let monitored: HashSet<i64> = self.config.monitored_chat_ids.iter().copied().collect();

        // Phase 1: recover the offline gap. The drained backlog is both the
        // acknowledgement of pending updates and the replay history.
        let replay = ReplayController::new(
            self.handler.clone(),
            self.checkpoints.clone(),
            self.pending.clone(),
            self.config.clone(),
        );
        match drain_backlog(&self.bot, &monitored, &self.pending).await {
            Ok(backlog) => replay.run(&backlog).await,
            Err(err) => {
                tracing::error!(target: "replay", error = %err, "backlog drain failed, skipping replay");
            }
        }

        // Phase 2: live ingestion. The coordinator owns every checkpoint
        // write from here on.
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator_handle =
            IngestCoordinator::new(self.handler.clone()).spawn(rx, self.shutdown.subscribe());

        let scheduler = self.broadcaster.clone().schedule().await?;

        let listener = LiveListener::new(self.bot.clone(), monitored, tx);
        let mut shutdown_listener = self.shutdown.subscribe();
        let mut listener_future = Box::pin(listener.run(self.shutdown.subscribe()));
        let mut listener_finished = false;

        tokio::select! {
            _ = shutdown_listener.notified() => {
                tracing::info!("shutdown signal received");
            }
            res = &mut listener_future => {
                listener_finished = true;
                if let Err(err) = res {
                    tracing::error!(error = %err, "telegram listener stopped with error");
                }
            }
        }

        self.shutdown.trigger();
        self.finalize(listener_future, listener_finished, coordinator_handle, scheduler)
            .await;

        notifier::notify_report_chat(
            self.client.as_ref(),
            &self.config,
            "hirewatch stopped.",
        )
        .await;
        tracing::info!("hirewatch stopped");
        Ok(())
    }

    async fn finalize(
        &self,
        mut listener_future: std::pin::Pin<Box<impl std::future::Future<Output = Result<()>>>>,
        listener_finished: bool,
        coordinator_handle: tokio::task::JoinHandle<()>,
        mut scheduler: JobScheduler,
    ) {
        let grace = Duration::from_secs(5);

        if !listener_finished {
            if timeout(grace, &mut listener_future).await.is_err() {
                tracing::warn!(target: "telegram", "listener did not stop within {:?}", grace);
            }
        }

        if timeout(grace, coordinator_handle).await.is_err() {
            tracing::warn!(target: "ingest", "coordinator did not stop within {:?}", grace);
        }

        match timeout(grace, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!(target: "broadcast", error = %err, "scheduler shutdown failed");
            }
            Err(_) => {
                tracing::warn!(target: "broadcast", "scheduler did not stop within {:?}", grace);
            }
        }

        // Flush durable state last; in-flight claims are dropped on purpose
        // and re-evaluated on next startup.
        self.checkpoints.flush().await;
        self.outreach_store.close().await;
    }
}
