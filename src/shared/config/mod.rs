//! Engine configuration module
//!
//! Provides the configuration type for the engine, its builder, TOML loading
//! and environment overrides.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000";

/// Bundles synced when none are configured
pub const DEFAULT_BUNDLES: &[&str] = &["events", "businesses", "community"];

/// Environment variable overriding the API base URL
pub const ENV_API_URL: &str = "LUSOTOWN_API_URL";
/// Environment variable overriding the periodic sync interval (seconds)
pub const ENV_SYNC_INTERVAL_SECS: &str = "LUSOTOWN_SYNC_INTERVAL_SECS";
/// Environment variable overriding the database file path
pub const ENV_DB_PATH: &str = "LUSOTOWN_DB_PATH";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the content, mutation and push endpoints
    pub api_base_url: String,
    /// Content bundles synced by the sync engine
    pub bundles: Vec<String>,
    /// Periodic sync interval
    pub sync_interval: Duration,
    /// Minimum gap between two reconnect-forced syncs
    pub forced_sync_debounce: Duration,
    /// How long a connectivity report must hold before it is committed
    pub connectivity_debounce: Duration,
    /// Bound applied to every network call
    pub network_timeout: Duration,
    /// Dispatch attempts before an action is dropped
    pub max_attempts: u32,
    /// Qualifying interactions before the install prompt is shown automatically
    pub engagement_threshold: u32,
    /// Delay between reaching the threshold and showing the prompt
    pub auto_prompt_delay: Duration,
    /// First re-drain delay after a failed drain pass
    pub retry_base_delay: Duration,
    /// Upper bound of the re-drain delay
    pub retry_max_delay: Duration,
    /// SQLite file; `None` selects the platform data directory
    pub database_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            bundles: DEFAULT_BUNDLES.iter().map(|b| b.to_string()).collect(),
            sync_interval: Duration::from_secs(5 * 60),
            forced_sync_debounce: Duration::from_secs(2),
            connectivity_debounce: Duration::from_millis(500),
            network_timeout: Duration::from_secs(10),
            max_attempts: 3,
            engagement_threshold: 3,
            auto_prompt_delay: Duration::from_secs(2),
            retry_base_delay: Duration::from_secs(2),
            retry_max_delay: Duration::from_secs(60),
            database_path: None,
        }
    }
}

impl EngineConfig {
    /// Create a new EngineConfigBuilder
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidUrl(self.api_base_url.clone()));
        }
        if self.bundles.is_empty() {
            return Err(ConfigError::MissingValue("bundles"));
        }
        for (i, bundle) in self.bundles.iter().enumerate() {
            if !is_valid_bundle_name(bundle) {
                return Err(ConfigError::invalid("bundles", format!("invalid bundle name {:?}", bundle)));
            }
            if self.bundles[..i].contains(bundle) {
                return Err(ConfigError::invalid("bundles", format!("duplicate bundle {:?}", bundle)));
            }
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::invalid("sync_interval", "must be greater than zero"));
        }
        if self.network_timeout.is_zero() {
            return Err(ConfigError::invalid("network_timeout", "must be greater than zero"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts", "must be at least 1"));
        }
        if self.engagement_threshold == 0 {
            return Err(ConfigError::invalid("engagement_threshold", "must be at least 1"));
        }
        if self.retry_base_delay > self.retry_max_delay {
            return Err(ConfigError::invalid("retry_base_delay", "exceeds retry_max_delay"));
        }
        Ok(())
    }

    /// Load a configuration from TOML; absent keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        file.into_builder().build()
    }

    /// Defaults overridden by the `LUSOTOWN_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides read through `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(secs) = lookup(ENV_SYNC_INTERVAL_SECS) {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid("sync_interval", format!("not a number: {}", secs)))?;
            self.sync_interval = Duration::from_secs(secs);
        }
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        self.validate()?;
        Ok(self)
    }

    /// Full URL for an API path
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }

    /// Resolved SQLite file location
    pub fn resolved_database_path(&self) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => {
                let mut path = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
                path.push("lusotown");
                path.push("engine.db");
                path
            }
        }
    }
}

/// Builder for EngineConfig
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Set the API base URL
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    /// Set the synced bundles
    pub fn bundles<I, S>(mut self, bundles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.bundles = bundles.into_iter().map(Into::into).collect();
        self
    }

    /// Set the periodic sync interval
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval = interval;
        self
    }

    /// Set the forced-sync debounce window
    pub fn forced_sync_debounce(mut self, window: Duration) -> Self {
        self.config.forced_sync_debounce = window;
        self
    }

    /// Set the connectivity debounce window
    pub fn connectivity_debounce(mut self, window: Duration) -> Self {
        self.config.connectivity_debounce = window;
        self
    }

    /// Set the per-call network timeout
    pub fn network_timeout(mut self, timeout: Duration) -> Self {
        self.config.network_timeout = timeout;
        self
    }

    /// Set the dispatch attempt ceiling
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the engagement threshold for the automatic install prompt
    pub fn engagement_threshold(mut self, threshold: u32) -> Self {
        self.config.engagement_threshold = threshold;
        self
    }

    /// Set the automatic install prompt delay
    pub fn auto_prompt_delay(mut self, delay: Duration) -> Self {
        self.config.auto_prompt_delay = delay;
        self
    }

    /// Set the re-drain backoff bounds
    pub fn retry_delays(mut self, base: Duration, max: Duration) -> Self {
        self.config.retry_base_delay = base;
        self.config.retry_max_delay = max;
        self
    }

    /// Set the SQLite file path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = Some(path.into());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// On-disk shape of the configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    api_base_url: Option<String>,
    bundles: Option<Vec<String>>,
    sync_interval_secs: Option<u64>,
    forced_sync_debounce_ms: Option<u64>,
    connectivity_debounce_ms: Option<u64>,
    network_timeout_secs: Option<u64>,
    max_attempts: Option<u32>,
    engagement_threshold: Option<u32>,
    auto_prompt_delay_ms: Option<u64>,
    retry_base_delay_ms: Option<u64>,
    retry_max_delay_ms: Option<u64>,
    database_path: Option<PathBuf>,
}

impl FileConfig {
    fn into_builder(self) -> EngineConfigBuilder {
        let mut builder = EngineConfig::builder();
        if let Some(url) = self.api_base_url {
            builder = builder.api_base_url(url);
        }
        if let Some(bundles) = self.bundles {
            builder = builder.bundles(bundles);
        }
        if let Some(secs) = self.sync_interval_secs {
            builder = builder.sync_interval(Duration::from_secs(secs));
        }
        if let Some(ms) = self.forced_sync_debounce_ms {
            builder = builder.forced_sync_debounce(Duration::from_millis(ms));
        }
        if let Some(ms) = self.connectivity_debounce_ms {
            builder = builder.connectivity_debounce(Duration::from_millis(ms));
        }
        if let Some(secs) = self.network_timeout_secs {
            builder = builder.network_timeout(Duration::from_secs(secs));
        }
        if let Some(attempts) = self.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if let Some(threshold) = self.engagement_threshold {
            builder = builder.engagement_threshold(threshold);
        }
        if let Some(ms) = self.auto_prompt_delay_ms {
            builder = builder.auto_prompt_delay(Duration::from_millis(ms));
        }
        let base = self.retry_base_delay_ms.map(Duration::from_millis);
        let max = self.retry_max_delay_ms.map(Duration::from_millis);
        if base.is_some() || max.is_some() {
            let defaults = EngineConfig::default();
            builder = builder.retry_delays(
                base.unwrap_or(defaults.retry_base_delay),
                max.unwrap_or(defaults.retry_max_delay),
            );
        }
        if let Some(path) = self.database_path {
            builder = builder.database_path(path);
        }
        builder
    }
}

/// Configuration errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
    #[error("could not parse configuration: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

/// Bundle names become a URL path segment: ASCII letters, digits, `-`, `_`
fn is_valid_bundle_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
