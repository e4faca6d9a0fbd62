use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub telegram_bot_token: String,
    pub monitored_chat_ids: Vec<i64>,
    pub report_chat_id: Option<i64>,
    pub llm: LlmConfig,
    pub model: ModelConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
    pub replay: ReplayConfig,
    pub outreach: OutreachConfig,
    pub broadcast: BroadcastConfig,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub primary: LlmProviderConfig,
    pub fallback: LlmProviderConfig,
}

#[derive(Debug, Clone)]
pub struct LlmProviderConfig {
    pub name: &'static str,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub asset_path: String,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub db_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Gap above which a channel's history is considered too stale to replay.
    pub max_gap: Duration,
    /// Scan starts this far before the checkpoint to tolerate boundary skew.
    pub boundary_skew: Duration,
}

#[derive(Debug, Clone)]
pub struct OutreachConfig {
    /// Seconds slept before a live outreach DM, inclusive range.
    pub live_delay_secs: (u64, u64),
    /// Seconds slept before a replayed outreach DM, inclusive range.
    pub replay_delay_secs: (u64, u64),
    /// Seconds slept between the DM and the report notification.
    pub report_delay_secs: (u64, u64),
    /// Contact cache entries older than this are refetched.
    pub contact_freshness: Duration,
}

#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    pub cron_spec: String,
    /// Minimum interval between two broadcast rounds.
    pub min_interval: Duration,
    pub per_group_delay: Duration,
    pub pitches_path: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for environment variable {0}: {1}")]
    Invalid(&'static str, String),
}
