//! Configuration management for Threadpost

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

pub const DEFAULT_BASE_URL: &str = "https://bsky.social/xrpc";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub thread: ThreadConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Limits and pacing for thread publishing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadConfig {
    pub max_post_length: usize,
    pub max_posts_per_thread: usize,
    pub base_delay_ms: u64,
    pub long_thread_delay_ms: u64,
    /// Threads with more posts than this use the long delay
    pub long_thread_threshold: usize,
    /// Heuristic per-call latency, used only for the displayed estimate
    pub api_time_estimate_ms: u64,
    pub warning_ratio: f64,
    pub danger_ratio: f64,
}

impl Default for ThreadConfig {
    fn default() -> Self {
        Self {
            max_post_length: 300,
            max_posts_per_thread: 200,
            base_delay_ms: 1000,
            long_thread_delay_ms: 2000,
            long_thread_threshold: 20,
            api_time_estimate_ms: 500,
            warning_ratio: 0.8,
            danger_ratio: 0.9,
        }
    }
}

impl ThreadConfig {
    /// Inter-post delay for a thread of `total` posts
    pub fn delay_for(&self, total: usize) -> Duration {
        if total > self.long_thread_threshold {
            Duration::from_millis(self.long_thread_delay_ms)
        } else {
            Duration::from_millis(self.base_delay_ms)
        }
    }

    pub fn api_time_estimate(&self) -> Duration {
        Duration::from_millis(self.api_time_estimate_ms)
    }
}

/// Where saved credentials live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    /// Alongside drafts in the local state file
    #[default]
    Local,
    /// OS keyring
    Keyring,
    /// Never persist credentials
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
    pub credentials: CredentialBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "~/.local/share/threadpost/state.json".to_string(),
            credentials: CredentialBackend::Local,
        }
    }
}

impl StorageConfig {
    pub fn expand_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the publisher cannot work with
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, reason: &str| ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        };

        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField("api.base_url".to_string()).into());
        }
        if self.thread.max_post_length == 0 {
            return Err(invalid("thread.max_post_length", "must be greater than 0").into());
        }
        if self.thread.max_posts_per_thread == 0 {
            return Err(invalid("thread.max_posts_per_thread", "must be greater than 0").into());
        }
        for (field, ratio) in [
            ("thread.warning_ratio", self.thread.warning_ratio),
            ("thread.danger_ratio", self.thread.danger_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(invalid(field, "must be in (0, 1]").into());
            }
        }
        if self.thread.warning_ratio >= self.thread.danger_ratio {
            return Err(invalid("thread.warning_ratio", "must be below danger_ratio").into());
        }

        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("THREADPOST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("threadpost").join("config.toml"))
}
