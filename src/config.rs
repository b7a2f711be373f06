use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use crate::telegram::format::ParseMode;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_url: String,
    pub log_level: String,
    pub logs_dir: PathBuf,
    /// Markup used by command replies.
    pub parse_mode: ParseMode,
    /// Destination of forwards and debug dumps.
    pub owner_chat_id: i64,
    /// The only sender allowed through the personal command group; 0 disables it.
    pub sara_user_id: i64,
    pub presa_trigger: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub reminder_interval_minutes: u64,
    pub reminder_text: String,
    pub reminder_reset_hour: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot_token: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            log_level: "info".to_string(),
            logs_dir: PathBuf::from("logs"),
            parse_mode: ParseMode::Html,
            owner_chat_id: 0,
            sara_user_id: 0,
            presa_trigger: "presa".to_string(),
            poll_interval: Duration::from_millis(1000),
            http_timeout: Duration::from_secs(30),
            reminder_interval_minutes: 0,
            reminder_text: "Did you take it?".to_string(),
            reminder_reset_hour: 4,
        }
    }
}

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_api_url(value: String) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_API_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(anyhow::anyhow!("BOT_TOKEN is required"));
        }

        let defaults = Config::default();
        let parse_mode_name = env_string("PARSE_MODE", defaults.parse_mode.as_str());
        let parse_mode = ParseMode::from_name(&parse_mode_name).ok_or_else(|| {
            anyhow::anyhow!("PARSE_MODE must be HTML or Markdown, got {parse_mode_name:?}")
        })?;
        let reset_hour = env_u64(
            "REMINDER_RESET_HOUR",
            u64::from(defaults.reminder_reset_hour),
        );

        Ok(Config {
            bot_token: bot_token.trim().to_string(),
            api_url: normalize_api_url(env_string("TELEGRAM_API_URL", DEFAULT_API_URL)),
            log_level: env_string("LOG_LEVEL", &defaults.log_level).to_lowercase(),
            logs_dir: PathBuf::from(env_string("LOGS_DIR", "logs")),
            parse_mode,
            owner_chat_id: env_i64("OWNER_CHAT_ID", defaults.owner_chat_id),
            sara_user_id: env_i64("SARA_USER_ID", defaults.sara_user_id),
            presa_trigger: env_string("PRESA_TRIGGER", &defaults.presa_trigger)
                .trim()
                .to_lowercase(),
            poll_interval: Duration::from_millis(env_u64("POLL_INTERVAL_MS", 1000)),
            http_timeout: Duration::from_secs(env_u64("HTTP_TIMEOUT_SECONDS", 30).max(1)),
            reminder_interval_minutes: env_u64("REMINDER_INTERVAL_MINUTES", 0),
            reminder_text: env_string("REMINDER_TEXT", &defaults.reminder_text),
            reminder_reset_hour: u32::try_from(reset_hour.min(23)).unwrap_or(0),
        })
    }
}
