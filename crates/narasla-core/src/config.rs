//! narasla configuration system.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables (a `.env` file is honoured):
//!
//! | Variable               | Field                     |
//! |------------------------|---------------------------|
//! | `TG_BOT_TOKEN`         | `telegram.bot_token`      |
//! | `NARASLA_STORAGE_PATH` | `storage.path`            |
//! | `NARASLA_TICK_SECS`    | `scheduler.tick_secs`     |
//! | `NARASLA_BATCH_SIZE`   | `consumer.batch_size`     |

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{NaraslaError, Result};
use crate::retry::RetryPolicy;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NaraslaConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl NaraslaConfig {
    /// Load `path` if it exists (defaults otherwise), then apply `.env` and
    /// process environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            tracing::debug!("no config file at {}, using defaults", path.display());
            Self::default()
        };

        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(".env not loaded: {e}");
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NaraslaError::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content).map_err(|e| NaraslaError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TG_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(path) = lookup("NARASLA_STORAGE_PATH") {
            self.storage.path = path;
        }
        if let Some(tick) = lookup("NARASLA_TICK_SECS") {
            self.scheduler.tick_secs = parse_env("NARASLA_TICK_SECS", &tick)?;
        }
        if let Some(size) = lookup("NARASLA_BATCH_SIZE") {
            self.consumer.batch_size = parse_env("NARASLA_BATCH_SIZE", &size)?;
        }
        Ok(())
    }

    /// Reject settings the loops cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(NaraslaError::Config(
                "bot token is not specified (set TG_BOT_TOKEN)".into(),
            ));
        }
        if self.scheduler.tick_secs == 0 {
            return Err(NaraslaError::Config("scheduler.tick_secs must be > 0".into()));
        }
        if self.consumer.batch_size == 0 {
            return Err(NaraslaError::Config("consumer.batch_size must be > 0".into()));
        }
        let (start, end) = (self.scheduler.send_window_start, self.scheduler.send_window_end);
        if start > end || end > 23 {
            return Err(NaraslaError::Config(format!(
                "invalid send window {start}..={end} (hours 0-23, start <= end)"
            )));
        }
        Ok(())
    }

    /// Get the default config path (~/.narasla/config.toml).
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the narasla home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".narasla")
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| NaraslaError::Config(format!("{key}: cannot parse '{value}'")))
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-poll timeout passed to `getUpdates`.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    /// HTTP request timeout; must exceed the long-poll timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_base() -> String { "https://api.telegram.org".into() }
fn default_poll_timeout() -> u64 { 25 }
fn default_request_timeout() -> u64 { 35 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `sqlite` or `memory`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_backend() -> String { "sqlite".into() }
fn default_storage_path() -> String { "~/.narasla/storage.db".into() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            path: default_storage_path(),
        }
    }
}

/// Event consumer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause after an empty batch or a failed fetch.
    #[serde(default = "default_idle_ms")]
    pub idle_ms: u64,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_max_trials")]
    pub max_trials: u32,
    /// Deadline for handling one event's command.
    #[serde(default = "default_event_deadline")]
    pub event_deadline_secs: u64,
}

fn default_batch_size() -> usize { 100 }
fn default_idle_ms() -> u64 { 1000 }
fn default_retry_base_ms() -> u64 { 100 }
fn default_max_trials() -> u32 { 8 }
fn default_event_deadline() -> u64 { 10 }

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            idle_ms: default_idle_ms(),
            retry_base_ms: default_retry_base_ms(),
            max_trials: default_max_trials(),
            event_deadline_secs: default_event_deadline(),
        }
    }
}

impl ConsumerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.retry_base_ms), self.max_trials)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn event_deadline(&self) -> Duration {
        Duration::from_secs(self.event_deadline_secs)
    }
}

/// Digest scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Earliest hour drawn for the next day's send time.
    #[serde(default = "default_window_start")]
    pub send_window_start: u32,
    /// Latest hour (inclusive) drawn for the next day's send time.
    #[serde(default = "default_window_end")]
    pub send_window_end: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_scheduler_trials")]
    pub max_trials: u32,
}

fn bool_true() -> bool { true }
fn default_tick_secs() -> u64 { 60 }
fn default_window_start() -> u32 { 9 }
fn default_window_end() -> u32 { 23 }
fn default_scheduler_trials() -> u32 { 5 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_secs: default_tick_secs(),
            send_window_start: default_window_start(),
            send_window_end: default_window_end(),
            retry_base_ms: default_retry_base_ms(),
            max_trials: default_scheduler_trials(),
        }
    }
}

impl SchedulerConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(self.retry_base_ms), self.max_trials)
    }
}
