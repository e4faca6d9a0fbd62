//! Live update dispatch plus the startup backlog drain. The Bot API retains
//! updates that arrived while the process was down; draining them through
//! `getUpdates` before the dispatcher starts both acknowledges them (so the
//! dispatcher will not see them again) and yields the history the replay
//! controller scans.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::{dispatching::Dispatcher, prelude::*, types::UpdateKind};
use tokio::sync::mpsc;

use crate::{
    db::pending::PendingUpdateRepo,
    domain::InboundMessage,
    infrastructure::shutdown::ShutdownListener,
    ingest::HistorySource,
};

type BotResult<T> = Result<T, teloxide::RequestError>;

/// Messages recovered from the pending-update backlog, grouped per chat and
/// sorted oldest-first.
pub struct UpdateBacklog {
    by_chat: HashMap<i64, Vec<InboundMessage>>,
}

impl UpdateBacklog {
    pub fn from_messages(messages: Vec<InboundMessage>) -> Self {
        let mut by_chat: HashMap<i64, Vec<InboundMessage>> = HashMap::new();
        for msg in messages {
            by_chat.entry(msg.chat_id).or_default().push(msg);
        }
        for list in by_chat.values_mut() {
            list.sort_by_key(|msg| msg.timestamp);
        }
        Self { by_chat }
    }

    pub fn total(&self) -> usize {
        self.by_chat.values().map(Vec::len).sum()
    }
}

#[async_trait]
impl HistorySource for UpdateBacklog {
    async fn fetch_since(
        &self,
        chat_id: i64,
        offset: DateTime<Utc>,
    ) -> Result<Vec<InboundMessage>> {
        Ok(self
            .by_chat
            .get(&chat_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|msg| msg.timestamp >= offset)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Drains and acknowledges every pending update before the dispatcher runs.
///
/// Each page is staged in `pending_updates` before the next `get_updates`
/// request confirms it server-side, and the returned backlog is rebuilt from
/// that table. An acknowledged update therefore always has a durable copy
/// until replay deletes it, and rows left behind by an earlier crash come
/// back as part of this startup's backlog.
pub async fn drain_backlog(
    bot: &Bot,
    monitored: &HashSet<i64>,
    staging: &PendingUpdateRepo,
) -> Result<UpdateBacklog> {
    let mut offset: Option<i32> = None;

    loop {
        let mut request = bot.get_updates().limit(100);
        if let Some(off) = offset {
            request = request.offset(off);
        }
        let updates = request.await?;
        if updates.is_empty() {
            break;
        }
        let mut page = Vec::new();
        for update in updates {
            offset = Some(update.id.as_offset());
            if let UpdateKind::Message(msg) = update.kind {
                if let Some(inbound) = to_inbound(&msg, monitored) {
                    page.push(inbound);
                }
            }
        }
        staging.insert_batch(&page).await?;
    }

    let backlog = UpdateBacklog::from_messages(staging.load_all().await?);
    tracing::info!(
        target: "telegram",
        pending = backlog.total(),
        "update backlog drained"
    );
    Ok(backlog)
}

struct ListenerState {
    monitored: HashSet<i64>,
    tx: mpsc::UnboundedSender<InboundMessage>,
}

/// Long-polling dispatcher feeding the ingest coordinator's queue.
pub struct LiveListener {
    bot: Bot,
    state: Arc<ListenerState>,
}

impl LiveListener {
    pub fn new(bot: Bot, monitored: HashSet<i64>, tx: mpsc::UnboundedSender<InboundMessage>) -> Self {
        Self {
            bot,
            state: Arc::new(ListenerState { monitored, tx }),
        }
    }

    pub async fn run(self, mut shutdown: ShutdownListener) -> Result<()> {
        let handler = Update::filter_message().branch(dptree::endpoint(Self::on_message));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.state.clone()])
            .default_handler(|update| async move {
                tracing::debug!(target: "telegram", ?update, "unhandled update");
            })
            .build();

        let shutdown_token = dispatcher.shutdown_token();
        let mut dispatch_future = Box::pin(dispatcher.dispatch());
        let mut dispatcher_finished = false;

        tokio::select! {
            _ = shutdown.notified() => {
                tracing::info!(target: "telegram", "dispatcher shutdown requested");
                if let Ok(wait) = shutdown_token.shutdown() {
                    wait.await;
                }
            }
            _ = &mut dispatch_future => {
                dispatcher_finished = true;
                tracing::info!(target: "telegram", "dispatcher finished");
            }
        }

        if !dispatcher_finished {
            dispatch_future.await;
        }
        Ok(())
    }

    async fn on_message(msg: Message, state: Arc<ListenerState>) -> BotResult<()> {
        if let Some(inbound) = to_inbound(&msg, &state.monitored) {
            if state.tx.send(inbound).is_err() {
                tracing::warn!(target: "telegram", "ingest queue closed, dropping message");
            }
        }
        Ok(())
    }
}

fn to_inbound(msg: &Message, monitored: &HashSet<i64>) -> Option<InboundMessage> {
    if !monitored.contains(&msg.chat.id.0) {
        return None;
    }
    let from = msg.from.as_ref()?;
    let text = msg
        .text()
        .or_else(|| msg.caption())
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        sender_id: i64::try_from(from.id.0).unwrap_or(i64::MAX),
        timestamp: msg.date,
        text: text.to_string(),
    })
}
