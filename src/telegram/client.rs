use anyhow::Result;
use async_trait::async_trait;

use crate::domain::UserProfile;

/// Reference to a message being replied to, possibly in another chat.
#[derive(Debug, Clone, Copy)]
pub struct ReplyRef {
    pub chat_id: i64,
    pub message_id: i32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    pub reply_to: Option<ReplyRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeFormat {
    Plain,
    Markdown,
}

/// Boundary to the messaging platform. Everything the pipeline needs from
/// Telegram goes through this trait so tests can substitute a recording
/// client. Failures are recoverable errors; delivery is never assumed
/// without a success return.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// The bot's own account id; used to skip self-authored messages.
    fn self_id(&self) -> i64;

    async fn resolve_user(&self, user_id: i64) -> Result<UserProfile>;

    async fn send_direct(&self, user_id: i64, text: &str, options: SendOptions) -> Result<()>;

    async fn send_channel(&self, chat_id: i64, text: &str, format: NoticeFormat) -> Result<()>;
}
