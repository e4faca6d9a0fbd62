use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::{
    prelude::*,
    types::{MessageId, ParseMode, Recipient, ReplyParameters},
};

use crate::domain::UserProfile;

use super::client::{MessagingClient, NoticeFormat, SendOptions};

/// Production [`MessagingClient`] over the Telegram Bot API.
pub struct BotClient {
    bot: Bot,
    self_id: i64,
}

impl BotClient {
    /// Authenticates against the platform; failure here aborts startup.
    pub async fn connect(bot: Bot) -> Result<Self> {
        let me = bot
            .get_me()
            .await
            .context("failed to authenticate with Telegram")?;
        let user = &me.user;
        tracing::info!(
            target: "telegram",
            bot_id = user.id.0,
            username = ?user.username,
            "Telegram bot connected"
        );
        Ok(Self {
            self_id: i64::try_from(user.id.0).unwrap_or(i64::MAX),
            bot,
        })
    }
}

#[async_trait]
impl MessagingClient for BotClient {
    fn self_id(&self) -> i64 {
        self.self_id
    }

    async fn resolve_user(&self, user_id: i64) -> Result<UserProfile> {
        let chat = self
            .bot
            .get_chat(ChatId(user_id))
            .await
            .with_context(|| format!("failed to resolve user {user_id}"))?;
        Ok(UserProfile {
            username: chat.username().map(|s| s.to_string()),
            first_name: chat.first_name().map(|s| s.to_string()),
            last_name: chat.last_name().map(|s| s.to_string()),
        })
    }

    async fn send_direct(&self, user_id: i64, text: &str, options: SendOptions) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(user_id), text);
        if let Some(reply) = options.reply_to {
            let mut params = ReplyParameters::new(MessageId(reply.message_id));
            params.chat_id = Some(Recipient::Id(ChatId(reply.chat_id)));
            request = request.reply_parameters(params);
        }
        request
            .await
            .with_context(|| format!("failed to send direct message to {user_id}"))?;
        Ok(())
    }

    async fn send_channel(&self, chat_id: i64, text: &str, format: NoticeFormat) -> Result<()> {
        let mut request = self.bot.send_message(ChatId(chat_id), text);
        if format == NoticeFormat::Markdown {
            request = request.parse_mode(ParseMode::Markdown);
        }
        request
            .await
            .with_context(|| format!("failed to send message to chat {chat_id}"))?;
        Ok(())
    }
}
