pub mod bot;
pub mod client;
pub mod listener;

pub use bot::BotClient;
pub use client::{MessagingClient, NoticeFormat, ReplyRef, SendOptions};
pub use listener::{drain_backlog, LiveListener, UpdateBacklog};
