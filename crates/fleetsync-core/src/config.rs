//! Configuration module for FleetSync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, environment overrides and a builder
//! pattern for programmatic use.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Environment variable overriding `remote.url`.
pub const ENV_REMOTE_URL: &str = "FLEETSYNC_REMOTE_URL";

/// Environment variable overriding `remote.key`.
pub const ENV_REMOTE_KEY: &str = "FLEETSYNC_REMOTE_KEY";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for FleetSync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// What is synchronized, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Milliseconds to wait after startup before the first pass.
    pub startup_delay_ms: u64,
    /// Seconds between periodic passes.
    pub interval_secs: u64,
    /// Milliseconds to wait after a local mutation before triggering a pass.
    pub mutation_settle_ms: u64,
    /// Whether remote change notifications trigger passes.
    pub realtime: bool,
    /// Entity collections, merged in this order. Each name is both the local
    /// key and the remote table.
    pub collections: Vec<String>,
    /// Remote-authoritative profiles table.
    pub profiles_table: String,
    /// Local key under which profiles are cached.
    pub profiles_key: String,
    /// Remote table holding settings rows.
    pub settings_table: String,
    /// Settings keys, reconciled in this order.
    pub settings_keys: Vec<String>,
    /// Settings key holding soft-deleted records.
    pub deleted_records_key: String,
}

/// Remote backend connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Backend base URL, e.g. `https://project.example.co`. `None` disables sync.
    pub url: Option<String>,
    /// API key sent as both `apikey` and bearer token.
    pub key: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Seconds between change-feed polls.
    pub realtime_poll_secs: u64,
    /// Seconds between connectivity probes.
    pub connectivity_probe_secs: u64,
}

/// Local replica store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/fleetsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("fleetsync")
            .join("config.yaml")
    }

    /// Load the configuration a binary runs with.
    ///
    /// An explicit `path` must exist and parse; without one the default path
    /// is tried and defaults are used if it is absent. Environment overrides
    /// are applied last.
    pub fn resolve(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => Self::load_or_default(&Self::default_path()),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `FLEETSYNC_REMOTE_URL` / `FLEETSYNC_REMOTE_KEY` from the process
    /// environment. Environment values take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_REMOTE_URL).ok(),
            std::env::var(ENV_REMOTE_KEY).ok(),
        );
    }

    /// Apply explicit remote overrides; empty strings are ignored.
    pub fn apply_overrides(&mut self, url: Option<String>, key: Option<String>) {
        if let Some(url) = url.filter(|v| !v.trim().is_empty()) {
            self.remote.url = Some(url);
        }
        if let Some(key) = key.filter(|v| !v.trim().is_empty()) {
            self.remote.key = Some(key);
        }
    }
}

impl RemoteConfig {
    /// Returns `(url, key)` when both are configured and non-empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let url = self.url.as_deref().filter(|v| !v.trim().is_empty())?;
        let key = self.key.as_deref().filter(|v| !v.trim().is_empty())?;
        Some((url, key))
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            startup_delay_ms: 500,
            interval_secs: 30,
            mutation_settle_ms: 100,
            realtime: true,
            collections: vec!["vehicle_records".to_string()],
            profiles_table: "profiles".to_string(),
            profiles_key: "system_users".to_string(),
            settings_table: "vehicle_settings".to_string(),
            settings_keys: vec![
                "vehicle_statuses".to_string(),
                "vehicle_photos".to_string(),
                "deleted_vehicle_records".to_string(),
            ],
            deleted_records_key: "deleted_vehicle_records".to_string(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            request_timeout_secs: 15,
            realtime_poll_secs: 5,
            connectivity_probe_secs: 10,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("fleetsync");
        Self {
            path: data_dir.join("fleetsync.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.interval_secs"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn check_names(field: &str, names: &[String], errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(field, "names must not be empty"));
        } else if !seen.insert(name.as_str()) {
            errors.push(ValidationError::new(field, format!("duplicate name: {name}")));
        }
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.interval_secs == 0 {
            errors.push(ValidationError::new(
                "sync.interval_secs",
                "must be greater than 0",
            ));
        }
        if self.sync.collections.is_empty() {
            errors.push(ValidationError::new(
                "sync.collections",
                "at least one collection is required",
            ));
        }
        check_names("sync.collections", &self.sync.collections, &mut errors);
        check_names("sync.settings_keys", &self.sync.settings_keys, &mut errors);
        for (field, value) in [
            ("sync.profiles_table", &self.sync.profiles_table),
            ("sync.profiles_key", &self.sync.profiles_key),
            ("sync.settings_table", &self.sync.settings_table),
            ("sync.deleted_records_key", &self.sync.deleted_records_key),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::new(field, "must not be empty"));
            }
        }
        if !self.sync.deleted_records_key.is_empty()
            && !self.sync.settings_keys.contains(&self.sync.deleted_records_key)
        {
            errors.push(ValidationError::new(
                "sync.deleted_records_key",
                "must also be listed in sync.settings_keys",
            ));
        }

        // --- remote ---
        if let Some(url) = &self.remote.url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(ValidationError::new(
                    "remote.url",
                    format!("must be an http(s) URL: {url}"),
                ));
            }
        }
        if self.remote.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "remote.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.remote.realtime_poll_secs == 0 {
            errors.push(ValidationError::new(
                "remote.realtime_poll_secs",
                "must be greater than 0",
            ));
        }
        if self.remote.connectivity_probe_secs == 0 {
            errors.push(ValidationError::new(
                "remote.connectivity_probe_secs",
                "must be greater than 0",
            ));
        }

        // --- store ---
        if self.store.path.as_os_str().is_empty() {
            errors.push(ValidationError::new("store.path", "must not be empty"));
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}'; expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Config`].
///
/// ```
/// use fleetsync_core::config::ConfigBuilder;
///
/// let cfg = ConfigBuilder::new()
///     .sync_interval_secs(60)
///     .logging_level("debug")
///     .build();
/// assert_eq!(cfg.sync.interval_secs, 60);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_startup_delay_ms(mut self, ms: u64) -> Self {
        self.config.sync.startup_delay_ms = ms;
        self
    }

    pub fn sync_interval_secs(mut self, seconds: u64) -> Self {
        self.config.sync.interval_secs = seconds;
        self
    }

    pub fn sync_mutation_settle_ms(mut self, ms: u64) -> Self {
        self.config.sync.mutation_settle_ms = ms;
        self
    }

    pub fn sync_realtime(mut self, enabled: bool) -> Self {
        self.config.sync.realtime = enabled;
        self
    }

    pub fn sync_collections(mut self, collections: Vec<String>) -> Self {
        self.config.sync.collections = collections;
        self
    }

    pub fn sync_settings_keys(mut self, keys: Vec<String>) -> Self {
        self.config.sync.settings_keys = keys;
        self
    }

    // --- remote ---

    pub fn remote_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.url = Some(url.into());
        self
    }

    pub fn remote_key(mut self, key: impl Into<String>) -> Self {
        self.config.remote.key = Some(key.into());
        self
    }

    pub fn remote_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.remote.request_timeout_secs = seconds;
        self
    }

    pub fn remote_realtime_poll_secs(mut self, seconds: u64) -> Self {
        self.config.remote.realtime_poll_secs = seconds;
        self
    }

    // --- store ---

    pub fn store_path(mut self, path: PathBuf) -> Self {
        self.config.store.path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_json(mut self, json: bool) -> Self {
        self.config.logging.json = json;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
