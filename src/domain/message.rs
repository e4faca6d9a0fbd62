use chrono::{DateTime, Utc};

/// Immutable unit of input: one message observed in a monitored group chat.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub message_id: i32,
    pub sender_id: i64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

impl InboundMessage {
    /// Short single-line excerpt for log output.
    pub fn preview(&self) -> String {
        let flat = self.text.replace('\n', " ");
        let mut out: String = flat.chars().take(60).collect();
        if flat.chars().count() > 60 {
            out.push('…');
        }
        out
    }
}
