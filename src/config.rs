use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::RetryPolicy;

/// Environment variable that overrides `api.base_url`.
pub const API_URL_ENV: &str = "RONIN_API_URL";

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/products";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Collection URL of the product store (e.g. "http://host:8080/api/products")
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl ApiConfig {
  pub fn base_url(&self) -> Result<Url> {
    Url::parse(&self.base_url).map_err(|e| eyre!("Invalid API base URL '{}': {}", self.base_url, e))
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long fetched data is served without refetching
  #[serde(default = "default_stale_time_secs")]
  pub stale_time_secs: u64,
  /// Retries after a failed read (0 disables retrying)
  #[serde(default)]
  pub max_retries: u32,
  #[serde(default = "default_retry_delay_ms")]
  pub retry_delay_ms: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_time_secs: default_stale_time_secs(),
      max_retries: 0,
      retry_delay_ms: default_retry_delay_ms(),
    }
  }
}

impl CacheConfig {
  pub fn stale_time(&self) -> chrono::Duration {
    // chrono durations are bounded by i64 milliseconds
    let secs = i64::try_from(self.stale_time_secs)
      .unwrap_or(i64::MAX)
      .min(i64::MAX / 1000);
    chrono::Duration::seconds(secs)
  }

  pub fn retry_policy(&self) -> RetryPolicy {
    RetryPolicy::new(
      self.max_retries,
      std::time::Duration::from_millis(self.retry_delay_ms),
    )
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is unset (e.g. "info", "ronin=debug")
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Log file for the terminal UI (defaults to the data directory)
  pub file: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      file: None,
    }
  }
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_stale_time_secs() -> u64 {
  300
}

fn default_retry_delay_ms() -> u64 {
  500
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./ronin.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/ronin/config.yaml
  ///
  /// Without a config file every setting takes its default. The
  /// `RONIN_API_URL` environment variable overrides the file's base URL.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      config.api.base_url = url;
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("ronin.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("ronin").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes as null
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Reject settings the client cannot run with.
  pub fn validate(&self) -> Result<()> {
    let url = self.api.base_url()?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!(
        "API base URL must use http or https, got '{}'",
        url.scheme()
      ));
    }
    if self.api.timeout_secs == 0 {
      return Err(eyre!("api.timeout_secs must be greater than zero"));
    }
    if self.cache.max_retries > RetryPolicy::MAX_RETRIES {
      return Err(eyre!(
        "cache.max_retries must be at most {}, got {}",
        RetryPolicy::MAX_RETRIES,
        self.cache.max_retries
      ));
    }
    Ok(())
  }
}
