//! Configuration management

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{OrchestratorError, Result};

/// Longest accepted interval for any periodic task (one year)
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Connection parameters handed to the storage service at startup
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Full connection URI; takes precedence over host/port when set
    pub uri: Option<String>,
    pub host: String,
    pub port: u16,
    pub db_name: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_source: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uri: None,
            host: "127.0.0.1".to_string(),
            port: 27017,
            db_name: "MegBot".to_string(),
            username: None,
            password: None,
            auth_source: None,
        }
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("uri", &self.uri.as_ref().map(|_| "<set>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auth_source", &self.auth_source)
            .finish()
    }
}

/// Bot behaviour and job intervals
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    /// Name used in wake/connect log lines
    pub nickname: String,
    /// Mood self-update period
    pub mood_update_interval: Duration,
    /// Emoji periodic check period, in minutes
    pub emoji_check_interval_mins: u64,
    /// Emoji registration scan period, in minutes
    pub emoji_register_interval_mins: u64,
    /// `build_memory` job period
    pub build_memory_interval: Duration,
    /// `forget_memory` job period
    pub forget_memory_interval: Duration,
    /// Output file for LLM usage statistics
    pub llm_stats_file: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            nickname: "MegBot".to_string(),
            mood_update_interval: Duration::from_secs(1),
            emoji_check_interval_mins: 120,
            emoji_register_interval_mins: 10,
            build_memory_interval: Duration::from_secs(600),
            forget_memory_interval: Duration::from_secs(600),
            llm_stats_file: PathBuf::from("llm_statistics.txt"),
        }
    }
}

impl BotConfig {
    /// `merge_memory` runs ten seconds behind the build cadence
    pub fn merge_memory_interval(&self) -> Duration {
        self.build_memory_interval.saturating_add(Duration::from_secs(10))
    }
}

/// Full process configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub storage: StorageConfig,
    pub bot: BotConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let storage = StorageConfig {
            uri: lookup("MONGODB_URI"),
            host: lookup("MONGODB_HOST").unwrap_or(defaults.storage.host),
            port: parse_or("MONGODB_PORT", lookup("MONGODB_PORT"), defaults.storage.port)?,
            db_name: lookup("DATABASE_NAME").unwrap_or(defaults.storage.db_name),
            username: lookup("MONGODB_USERNAME"),
            password: lookup("MONGODB_PASSWORD"),
            auth_source: lookup("MONGODB_AUTH_SOURCE"),
        };

        let mood_secs: f64 = parse_or(
            "MOOD_UPDATE_INTERVAL",
            lookup("MOOD_UPDATE_INTERVAL"),
            defaults.bot.mood_update_interval.as_secs_f64(),
        )?;
        if !mood_secs.is_finite() || mood_secs <= 0.0 {
            return Err(invalid("MOOD_UPDATE_INTERVAL", mood_secs.to_string(), "must be positive"));
        }
        let mood_update_interval = Duration::try_from_secs_f64(mood_secs)
            .map_err(|e| invalid("MOOD_UPDATE_INTERVAL", mood_secs.to_string(), &e.to_string()))?;
        if mood_update_interval > MAX_INTERVAL {
            return Err(invalid("MOOD_UPDATE_INTERVAL", mood_secs.to_string(), "exceeds one year"));
        }

        let bot = BotConfig {
            nickname: lookup("BOT_NICKNAME").unwrap_or(defaults.bot.nickname),
            mood_update_interval,
            emoji_check_interval_mins: interval_mins(
                "EMOJI_CHECK_INTERVAL",
                lookup("EMOJI_CHECK_INTERVAL"),
                defaults.bot.emoji_check_interval_mins,
            )?,
            emoji_register_interval_mins: interval_mins(
                "EMOJI_REGISTER_INTERVAL",
                lookup("EMOJI_REGISTER_INTERVAL"),
                defaults.bot.emoji_register_interval_mins,
            )?,
            build_memory_interval: interval_secs(
                "BUILD_MEMORY_INTERVAL",
                lookup("BUILD_MEMORY_INTERVAL"),
                defaults.bot.build_memory_interval,
            )?,
            forget_memory_interval: interval_secs(
                "FORGET_MEMORY_INTERVAL",
                lookup("FORGET_MEMORY_INTERVAL"),
                defaults.bot.forget_memory_interval,
            )?,
            llm_stats_file: lookup("LLM_STATS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.bot.llm_stats_file),
        };

        Ok(Self { storage, bot })
    }
}

fn invalid(var: &'static str, value: String, reason: &str) -> OrchestratorError {
    OrchestratorError::Config {
        var,
        value,
        reason: reason.to_string(),
    }
}

fn parse_or<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(var, value.clone(), &e.to_string())),
    }
}

/// Whole-unit interval in `1..=max`
fn bounded(var: &'static str, raw: Option<String>, default: u64, max: u64) -> Result<u64> {
    let value = parse_or(var, raw, default)?;
    if value == 0 {
        return Err(invalid(var, "0".to_string(), "must be greater than zero"));
    }
    if value > max {
        return Err(invalid(var, value.to_string(), "exceeds one year"));
    }
    Ok(value)
}

fn interval_secs(var: &'static str, raw: Option<String>, default: Duration) -> Result<Duration> {
    bounded(var, raw, default.as_secs(), MAX_INTERVAL.as_secs()).map(Duration::from_secs)
}

fn interval_mins(var: &'static str, raw: Option<String>, default: u64) -> Result<u64> {
    bounded(var, raw, default, MAX_INTERVAL.as_secs() / 60)
}
