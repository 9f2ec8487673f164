use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::Locale;
use crate::cache::ResourceClass;

const FALLBACK_BASE_URL: &str = "http://localhost:8000/api/v1";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub polling: PollingConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub connectivity: ConnectivityConfig,
  #[serde(default)]
  pub locale: Locale,
  #[serde(default)]
  pub watchlist: WatchlistConfig,
  /// Custom title for the header (defaults to the API host)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  pub api_key: Option<String>,
  pub timeouts: TimeoutConfig,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: option_env!("NEWSDASH_API_URL")
        .unwrap_or(FALLBACK_BASE_URL)
        .to_string(),
      api_key: option_env!("NEWSDASH_API_KEY").map(str::to_string),
      timeouts: TimeoutConfig::default(),
    }
  }
}

/// Request timeouts per resource class, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
  pub realtime_secs: u64,
  pub frequent_secs: u64,
  pub standard_secs: u64,
  pub static_secs: u64,
}

impl Default for TimeoutConfig {
  fn default() -> Self {
    Self {
      realtime_secs: ResourceClass::Realtime.request_timeout().as_secs(),
      frequent_secs: ResourceClass::Frequent.request_timeout().as_secs(),
      standard_secs: ResourceClass::Standard.request_timeout().as_secs(),
      static_secs: ResourceClass::Static.request_timeout().as_secs(),
    }
  }
}

impl TimeoutConfig {
  pub fn for_class(&self, class: ResourceClass) -> Duration {
    let secs = match class {
      ResourceClass::Realtime => self.realtime_secs,
      ResourceClass::Frequent => self.frequent_secs,
      ResourceClass::Standard => self.standard_secs,
      ResourceClass::Static => self.static_secs,
    };
    Duration::from_secs(secs.max(1))
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
  /// Interval multiplier while the terminal is unfocused
  pub hidden_multiplier: u32,
  /// Upper bound on the backoff delay; the unfocused multiplier applies on top
  pub max_interval_secs: u64,
}

impl Default for PollingConfig {
  fn default() -> Self {
    Self {
      hidden_multiplier: crate::sync::scheduler::DEFAULT_HIDDEN_MULTIPLIER,
      max_interval_secs: crate::sync::scheduler::DEFAULT_MAX_INTERVAL.as_secs(),
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// How long an unused entry survives before eviction
  pub gc_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      gc_secs: crate::cache::DEFAULT_GC_WINDOW.as_secs(),
    }
  }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
  pub grace_millis: u64,
  pub probe_online_secs: u64,
  pub probe_offline_secs: u64,
}

impl Default for ConnectivityConfig {
  fn default() -> Self {
    Self {
      grace_millis: crate::sync::connectivity::DEFAULT_RECONNECT_GRACE.as_millis() as u64,
      probe_online_secs: 30,
      probe_offline_secs: 5,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchlistConfig {
  /// Ticker symbols shown on the markets view
  #[serde(default, deserialize_with = "deserialize_uppercase_set")]
  pub symbols: BTreeSet<String>,
}

impl WatchlistConfig {
  /// Add symbols, normalized the same way as the config file
  pub fn extend(&mut self, symbols: impl IntoIterator<Item = String>) {
    self.symbols.extend(
      symbols
        .into_iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty()),
    );
  }
}

fn deserialize_uppercase_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let v: Vec<String> = Vec::deserialize(deserializer)?;
  Ok(
    v.into_iter()
      .map(|s| s.trim().to_uppercase())
      .filter(|s| !s.is_empty())
      .collect(),
  )
}

impl Config {
  /// Load configuration from file, falling back to defaults when no file
  /// exists. Environment overrides are applied last.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./newsdash.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/newsdash/config.yaml
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

    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("newsdash.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("newsdash").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file is a valid config with every default.
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Runtime overrides: NEWSDASH_API_URL and NEWSDASH_API_KEY.
  fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("NEWSDASH_API_URL").filter(|v| !v.trim().is_empty()) {
      self.api.base_url = url;
    }
    if let Some(key) = lookup("NEWSDASH_API_KEY").filter(|v| !v.trim().is_empty()) {
      self.api.api_key = Some(key);
    }
  }

  pub fn gc_window(&self) -> Duration {
    Duration::from_secs(self.cache.gc_secs)
  }

  pub fn poll_policy(&self) -> crate::sync::PollPolicy {
    crate::sync::PollPolicy {
      hidden_multiplier: self.polling.hidden_multiplier.max(1),
      max_interval: Duration::from_secs(self.polling.max_interval_secs),
    }
  }

  pub fn reconnect_grace(&self) -> Duration {
    Duration::from_millis(self.connectivity.grace_millis)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.locale, Locale::En);
    assert_eq!(config.gc_window(), Duration::from_secs(300));
    assert_eq!(config.poll_policy().hidden_multiplier, 10);
    assert_eq!(config.reconnect_grace(), Duration::from_secs(3));
    assert_eq!(
      config.api.timeouts.for_class(ResourceClass::Realtime),
      Duration::from_secs(10)
    );
  }

  #[test]
  fn test_partial_sections() {
    let config = Config::parse(
      r#"
api:
  base_url: https://news.example.com/api/v1
  timeouts:
    standard_secs: 12
polling:
  hidden_multiplier: 4
locale: es
watchlist:
  symbols: [aapl, " msft ", AAPL, ""]
"#,
    )
    .unwrap();

    assert_eq!(config.api.base_url, "https://news.example.com/api/v1");
    assert_eq!(
      config.api.timeouts.for_class(ResourceClass::Standard),
      Duration::from_secs(12)
    );
    assert_eq!(
      config.api.timeouts.for_class(ResourceClass::Frequent),
      Duration::from_secs(15)
    );
    assert_eq!(config.poll_policy().hidden_multiplier, 4);
    assert_eq!(config.locale, Locale::Es);
    assert_eq!(
      config.watchlist.symbols.iter().collect::<Vec<_>>(),
      vec!["AAPL", "MSFT"]
    );
  }

  #[test]
  fn test_env_overrides() {
    let mut config = Config::default();
    config.apply_env(|name| match name {
      "NEWSDASH_API_URL" => Some("http://10.0.0.5:9000/api/v1".to_string()),
      "NEWSDASH_API_KEY" => Some("secret".to_string()),
      _ => None,
    });

    assert_eq!(config.api.base_url, "http://10.0.0.5:9000/api/v1");
    assert_eq!(config.api.api_key.as_deref(), Some("secret"));
  }

  #[test]
  fn test_blank_env_is_ignored() {
    let mut config = Config::default();
    let before = config.api.base_url.clone();
    config.apply_env(|_| Some("  ".to_string()));
    assert_eq!(config.api.base_url, before);
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let result = Config::load(Some(Path::new("/nonexistent/newsdash.yaml")));
    assert!(result.is_err());
  }

  #[test]
  fn test_zero_timeout_is_clamped() {
    let config = Config::parse(
      r#"
api:
  timeouts:
    realtime_secs: 0
"#,
    )
    .unwrap();

    assert_eq!(
      config.api.timeouts.for_class(ResourceClass::Realtime),
      Duration::from_secs(1)
    );
  }

  #[test]
  fn test_watchlist_extend_normalizes() {
    let mut watchlist = WatchlistConfig::default();
    watchlist.extend(vec![" aapl".to_string(), "AAPL".to_string(), "  ".to_string()]);
    assert_eq!(watchlist.symbols.len(), 1);
    assert!(watchlist.symbols.contains("AAPL"));
  }
}
