use std::env;

use super::env::{
    AppConfig, BroadcastConfig, ConfigError, DirectoryConfig, LlmConfig, LlmProviderConfig,
    LoggingConfig, ModelConfig, OutreachConfig, ReplayConfig,
};

const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let telegram_bot_token = env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let monitored_chat_ids = parse_id_list("MONITORED_CHAT_IDS")?;
        if monitored_chat_ids.is_empty() {
            return Err(ConfigError::Missing("MONITORED_CHAT_IDS"));
        }
        let report_chat_id = parse_int("REPORT_CHAT_ID");

        let llm = LlmConfig {
            primary: LlmProviderConfig {
                name: "gemini",
                endpoint: env::var("GEMINI_ENDPOINT")
                    .unwrap_or_else(|_| GEMINI_ENDPOINT.to_string()),
                api_key: env::var("GEMINI_API_KEY").ok().filter(|v| !v.is_empty()),
                model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemma-3-12b-it".to_string()),
            },
            fallback: LlmProviderConfig {
                name: "openrouter",
                endpoint: env::var("OPENROUTER_ENDPOINT")
                    .unwrap_or_else(|_| OPENROUTER_ENDPOINT.to_string()),
                api_key: env::var("OPENROUTER_API_KEY").ok().filter(|v| !v.is_empty()),
                model: env::var("OPENROUTER_MODEL")
                    .unwrap_or_else(|_| "mistralai/devstral-small:free".to_string()),
            },
        };

        let model = ModelConfig {
            asset_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/intent_model.json".to_string()),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            db_filename: env::var("DB_FILENAME").unwrap_or_else(|_| "hirewatch.db".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let timezone = env::var("BOT_TIMEZONE").unwrap_or_else(|_| "Africa/Lagos".to_string());

        let replay = ReplayConfig {
            max_gap: duration_secs("REPLAY_MAX_GAP_SECS", 12 * 3600),
            boundary_skew: duration_secs("REPLAY_BOUNDARY_SKEW_SECS", 10),
        };

        let outreach = OutreachConfig {
            live_delay_secs: delay_range("OUTREACH_LIVE_DELAY", (5, 15))?,
            replay_delay_secs: delay_range("OUTREACH_REPLAY_DELAY", (3, 8))?,
            report_delay_secs: delay_range("OUTREACH_REPORT_DELAY", (2, 3))?,
            contact_freshness: duration_secs("CONTACT_FRESHNESS_SECS", 3600),
        };

        let broadcast = BroadcastConfig {
            cron_spec: env::var("BROADCAST_CRON").unwrap_or_else(|_| "0 0 * * * *".to_string()),
            min_interval: duration_secs("BROADCAST_MIN_INTERVAL_SECS", 24 * 3600),
            per_group_delay: duration_secs("BROADCAST_PER_GROUP_DELAY_SECS", 10),
            pitches_path: env::var("PITCHES_PATH").unwrap_or_else(|_| "data/pitches.txt".to_string()),
        };

        Ok(Self {
            telegram_bot_token,
            monitored_chat_ids,
            report_chat_id,
            llm,
            model,
            directories,
            logging,
            timezone,
            replay,
            outreach,
            broadcast,
        })
    }
}

fn parse_int(key: &str) -> Option<i64> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
}

fn parse_id_list(key: &'static str) -> Result<Vec<i64>, ConfigError> {
    let raw = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(Vec::new()),
    };
    let mut ids = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let id = part
            .parse::<i64>()
            .map_err(|_| ConfigError::Invalid(key, part.to_string()))?;
        ids.push(id);
    }
    Ok(ids)
}

fn duration_secs(key: &str, default: u64) -> std::time::Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default);
    std::time::Duration::from_secs(secs)
}

/// Parses "MIN..MAX" (seconds) into an inclusive delay range.
fn delay_range(key: &'static str, default: (u64, u64)) -> Result<(u64, u64), ConfigError> {
    let raw = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    let parsed = raw
        .split_once("..")
        .and_then(|(lo, hi)| Some((lo.trim().parse::<u64>().ok()?, hi.trim().parse::<u64>().ok()?)))
        .filter(|(lo, hi)| lo <= hi);
    parsed.ok_or_else(|| ConfigError::Invalid(key, raw))
}
