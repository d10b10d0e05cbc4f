//! WordNest configuration system.
//!
//! Values come from an optional TOML file and are then overridden from the
//! environment. `validate()` must pass before the process starts serving.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WordNestError};

pub const ENV_BOT_TOKEN: &str = "WORDNEST_BOT_TOKEN";
pub const ENV_SYNC_URL: &str = "WORDNEST_SYNC_URL";
pub const ENV_SYNC_SECRET: &str = "WORDNEST_SYNC_SECRET";
pub const ENV_TIMEZONE: &str = "WORDNEST_TIMEZONE";
pub const ENV_STORE_PATH: &str = "WORDNEST_STORE_PATH";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WordNestConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub dialogue: DialogueConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl WordNestConfig {
    /// Load from the default path if it exists, defaults otherwise. Environment
    /// overrides are applied either way.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a specific path, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a TOML file without consulting the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WordNestError::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| WordNestError::Config(format!("Failed to parse config: {e}")))
    }

    /// Override fields from environment-style variables. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get(ENV_BOT_TOKEN) {
            self.telegram.bot_token = v;
        }
        if let Some(v) = get(ENV_SYNC_URL) {
            self.sync.url = v;
        }
        if let Some(v) = get(ENV_SYNC_SECRET) {
            self.sync.secret = v;
        }
        if let Some(v) = get(ENV_TIMEZONE) {
            self.schedule.timezone = v;
        }
        if let Some(v) = get(ENV_STORE_PATH) {
            self.store.path = v;
        }
    }

    /// Check everything required at startup. Any failure here is fatal.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(WordNestError::Config(format!(
                "bot token missing (set {ENV_BOT_TOKEN} or telegram.bot_token)"
            )));
        }
        if self.sync.enabled {
            if self.sync.url.trim().is_empty() {
                return Err(WordNestError::Config(format!(
                    "sync endpoint missing (set {ENV_SYNC_URL} or disable sync)"
                )));
            }
            if self.sync.secret.trim().is_empty() {
                return Err(WordNestError::Config(format!(
                    "sync secret missing (set {ENV_SYNC_SECRET} or disable sync)"
                )));
            }
        }
        self.schedule.tz()?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the WordNest home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wordnest")
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Seconds to wait between polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Long-poll timeout passed to getUpdates.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: u64,
}

fn default_poll_interval() -> u64 { 1 }
fn default_poll_timeout() -> u64 { 30 }

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            poll_interval: default_poll_interval(),
            poll_timeout: default_poll_timeout(),
        }
    }
}

/// How a timer computes its next fire after firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RearmStrategy {
    /// Recompute the next local HH:MM in the configured timezone. Survives DST.
    #[default]
    WallClock,
    /// Add exactly 24 hours. Local delivery time shifts by the DST offset.
    FixedInterval,
}

/// When the delivery cursor moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CursorPolicy {
    /// Only after the notifier confirms the send.
    #[default]
    AdvanceOnSend,
    /// On every fire, even if the send failed.
    AlwaysAdvance,
}

/// Scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone applied to every learner's delivery time.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub rearm: RearmStrategy,
    #[serde(default)]
    pub cursor_policy: CursorPolicy,
}

fn default_timezone() -> String { "Asia/Tehran".into() }

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            rearm: RearmStrategy::default(),
            cursor_policy: CursorPolicy::default(),
        }
    }
}

impl ScheduleConfig {
    /// Parsed timezone.
    pub fn tz(&self) -> Result<chrono_tz::Tz> {
        self.timezone
            .parse()
            .map_err(|_| WordNestError::Config(format!("unknown timezone '{}'", self.timezone)))
    }
}

/// Setup dialogue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Ask for an email address as the last setup step.
    #[serde(default = "bool_true")]
    pub capture_email: bool,
}

fn bool_true() -> bool { true }

impl Default for DialogueConfig {
    fn default() -> Self {
        Self { capture_email: true }
    }
}

/// Remote record-keeping endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_sync_timeout")]
    pub timeout_secs: u64,
}

fn default_sync_timeout() -> u64 { 10 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: String::new(),
            secret: String::new(),
            timeout_secs: default_sync_timeout(),
        }
    }
}

/// Profile store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Json,
    Sqlite,
    Memory,
}

/// Profile store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// File path; `~` is expanded.
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "~/.wordnest/profiles.json".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_store_path(),
        }
    }
}

impl StoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}
