//! Live ingestion loop. The Telegram listener pushes inbound messages into an
//! unbounded channel; this task drains it through the shared handler. Events
//! that arrive while replay is still running simply queue up here, so replay
//! and live handling never race on a channel's checkpoint.

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    domain::InboundMessage,
    infrastructure::shutdown::ShutdownListener,
    ingest::handler::{IngestSource, MessageHandler},
};

pub struct IngestCoordinator {
    handler: Arc<MessageHandler>,
}

impl IngestCoordinator {
    pub fn new(handler: Arc<MessageHandler>) -> Self {
        Self { handler }
    }

    pub fn spawn(
        self,
        rx: mpsc::UnboundedReceiver<InboundMessage>,
        shutdown: ShutdownListener,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(rx, shutdown).await;
        })
    }

    async fn run(
        &self,
        mut rx: mpsc::UnboundedReceiver<InboundMessage>,
        mut shutdown: ShutdownListener,
    ) {
        loop {
            tokio::select! {
                maybe_msg = rx.recv() => {
                    match maybe_msg {
                        Some(msg) => {
                            let outcome = self.handler.handle(&msg, IngestSource::Live).await;
                            tracing::debug!(
                                target: "ingest",
                                chat_id = msg.chat_id,
                                sender_id = msg.sender_id,
                                ?outcome,
                                "live message handled"
                            );
                        }
                        None => break,
                    }
                }
                _ = shutdown.notified() => break,
            }
        }
        tracing::info!(target: "ingest", "live coordinator stopped");
    }
}
