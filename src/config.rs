use serde::Deserialize;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;

use crate::assistant::engine::Settings;
use crate::assistant::i18n::Content;
use crate::assistant::phone::PhoneRule;
use crate::assistant::reminders::{self, ReminderSettings};

/// Environment variables that take precedence over the file.
pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
pub const ENV_OPERATOR_ID: &str = "OPERATOR_ID";

/// Upper bound for `reminder_interval_minutes` (one week).
const MAX_REMINDER_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
/// Upper bound for `reminder_after_minutes` (one year).
const MAX_REMINDER_AFTER_MINUTES: i64 = 365 * 24 * 60;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file '{}': {source}", .path.display())]
    ParseJson { path: PathBuf, source: serde_json::Error },
    #[error("invalid export_cron '{expr}': {source}")]
    InvalidCron { expr: String, source: cron::error::Error },
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),
    #[error("config validation error: {0}")]
    Validation(String),
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    telegram_bot_token: String,
    /// Telegram user id of the manager who receives leads.
    #[serde(default)]
    operator_id: i64,
    #[serde(default = "default_brand")]
    brand: String,
    #[serde(default = "default_channel")]
    channel: String,
    #[serde(default = "default_manager_phone")]
    manager_phone: String,
    /// Directory for the database and logs. Defaults to current directory.
    data_dir: Option<String>,
    log_chat_id: Option<i64>,
    #[serde(default = "default_country_code")]
    phone_country_code: String,
    #[serde(default = "default_phone_length")]
    phone_length: usize,
    /// Minutes between reminder scans (0 = disabled).
    #[serde(default = "default_reminder_interval")]
    reminder_interval_minutes: u64,
    #[serde(default = "default_reminder_after")]
    reminder_after_minutes: i64,
    /// Cron expression (sec min hour dom mon dow) for the automatic export.
    export_cron: Option<String>,
    #[serde(default = "default_timezone")]
    timezone: String,
}

fn default_brand() -> String {
    Content::default().brand
}

fn default_channel() -> String {
    Content::default().channel
}

fn default_manager_phone() -> String {
    Content::default().manager_phone
}

fn default_country_code() -> String {
    PhoneRule::default().country_code
}

fn default_phone_length() -> usize {
    PhoneRule::default().length
}

fn default_reminder_interval() -> u64 {
    5
}

fn default_reminder_after() -> i64 {
    30
}

fn default_timezone() -> String {
    "Asia/Tashkent".to_string()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub operator_id: i64,
    pub content: Content,
    /// Directory for the database and logs.
    pub data_dir: PathBuf,
    pub log_chat_id: Option<i64>,
    pub phone_rule: PhoneRule,
    pub reminders: ReminderSettings,
    pub export_cron: Option<String>,
    /// Zone for human-facing timestamps.
    pub timezone: Tz,
}

impl Config {
    /// Load from `path`, with `BOT_TOKEN` / `OPERATOR_ID` from the process environment winning.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<P, F>(path: P, env: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadFile {
            path: config_path.clone(),
            source: e,
        })?;
        let mut file: ConfigFile = serde_json::from_str(&content).map_err(|e| ConfigError::ParseJson {
            path: config_path.clone(),
            source: e,
        })?;

        if let Some(token) = env(ENV_BOT_TOKEN).filter(|t| !t.trim().is_empty()) {
            file.telegram_bot_token = token.trim().to_string();
        }
        if let Some(raw) = env(ENV_OPERATOR_ID).filter(|v| !v.trim().is_empty()) {
            file.operator_id = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Validation(format!("{ENV_OPERATOR_ID} must be a numeric Telegram user id")))?;
        }

        Self::validate(file)
    }

    fn validate(file: ConfigFile) -> Result<Self, ConfigError> {
        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }
        if file.operator_id == 0 {
            return Err(ConfigError::Validation("operator_id is required".into()));
        }

        let country_code = file.phone_country_code.trim_start_matches('+').to_string();
        if country_code.is_empty() || !country_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Validation("phone_country_code must be digits".into()));
        }
        if file.phone_length <= country_code.len() || file.phone_length > 15 {
            return Err(ConfigError::Validation(format!(
                "phone_length must be between {} and 15",
                country_code.len() + 1
            )));
        }
        if file.reminder_interval_minutes > MAX_REMINDER_INTERVAL_MINUTES {
            return Err(ConfigError::Validation(format!(
                "reminder_interval_minutes must be at most {MAX_REMINDER_INTERVAL_MINUTES}"
            )));
        }
        if file.reminder_after_minutes <= 0 || file.reminder_after_minutes > MAX_REMINDER_AFTER_MINUTES {
            return Err(ConfigError::Validation(format!(
                "reminder_after_minutes must be between 1 and {MAX_REMINDER_AFTER_MINUTES}"
            )));
        }
        let reminder_settings = match (
            file.reminder_interval_minutes.checked_mul(60),
            chrono::Duration::try_minutes(file.reminder_after_minutes),
        ) {
            (Some(secs), Some(stale_after)) => ReminderSettings {
                interval: std::time::Duration::from_secs(secs),
                stale_after,
            },
            _ => return Err(ConfigError::Validation("reminder settings out of range".into())),
        };

        let export_cron = match file.export_cron.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) {
            Some(expr) => {
                reminders::validate_cron(&expr).map_err(|source| ConfigError::InvalidCron {
                    expr: expr.clone(),
                    source,
                })?;
                Some(expr)
            }
            None => None,
        };

        let timezone: Tz = file
            .timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(file.timezone.clone()))?;

        let channel = file.channel.trim().trim_start_matches('@').to_string();
        if channel.is_empty() {
            return Err(ConfigError::Validation("channel must not be empty".into()));
        }

        let data_dir = file.data_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token: file.telegram_bot_token,
            operator_id: file.operator_id,
            content: Content {
                brand: file.brand,
                channel,
                manager_phone: file.manager_phone,
            },
            data_dir,
            log_chat_id: file.log_chat_id,
            phone_rule: PhoneRule::new(country_code, file.phone_length),
            reminders: reminder_settings,
            export_cron,
            timezone,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("leads.db")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Engine settings derived from this config.
    pub fn settings(&self) -> Settings {
        Settings {
            operator_id: self.operator_id,
            phone_rule: self.phone_rule.clone(),
            content: self.content.clone(),
            timezone: self.timezone,
        }
    }
}
