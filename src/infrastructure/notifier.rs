use chrono::Utc;
use chrono_tz::Tz;

use crate::{
    config::AppConfig,
    telegram::client::{MessagingClient, NoticeFormat},
};

const REPORT_TEXT_LIMIT: usize = 300;

/// Posts an outreach summary to the configured report chat. Fire-and-forget:
/// a delivery failure is logged and never affects the outreach outcome.
pub async fn report_outreach(
    client: &dyn MessagingClient,
    config: &AppConfig,
    sender_id: i64,
    original_text: &str,
    delivered: bool,
) {
    let Some(report_chat_id) = config.report_chat_id else {
        return;
    };

    let tz: Tz = config.timezone.parse().unwrap_or(chrono_tz::Africa::Lagos);
    let at = Utc::now().with_timezone(&tz).format("%Y-%m-%d %H:%M:%S");
    let action = if delivered {
        "You just texted"
    } else {
        "You just tried to text"
    };
    let outcome = if delivered { "" } else { ", but it failed" };
    let text = format!(
        "📢 {action} [this employer](tg://user?id={sender_id}) regarding a job{outcome}.\n\
         At: {at}\n\nMessage: \"{}\"",
        truncate(original_text, REPORT_TEXT_LIMIT)
    );

    if let Err(err) = client
        .send_channel(report_chat_id, &text, NoticeFormat::Markdown)
        .await
    {
        tracing::warn!(
            target: "notifier",
            error = %err,
            report_chat_id,
            sender_id,
            "failed to send outreach report"
        );
    }
}

/// Sends a plain status notice to the report chat, if one is configured.
pub async fn notify_report_chat(client: &dyn MessagingClient, config: &AppConfig, text: &str) {
    let Some(report_chat_id) = config.report_chat_id else {
        return;
    };
    if let Err(err) = client
        .send_channel(report_chat_id, text, NoticeFormat::Plain)
        .await
    {
        tracing::warn!(
            target: "notifier",
            error = %err,
            report_chat_id,
            "failed to send status notice"
        );
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "héllo wörld".repeat(40);
        let cut = truncate(&text, 300);
        assert_eq!(cut.chars().count(), 301);
        assert!(cut.ends_with('…'));
        assert_eq!(truncate("short", 300), "short");
    }
}
