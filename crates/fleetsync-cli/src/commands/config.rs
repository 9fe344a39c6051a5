//! Config command - View and manage FleetSync configuration
//!
//! Provides the `fleetsync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON) with the key masked
//! 2. Sets individual configuration values via dot-notation keys
//! 3. Validates the configuration file and reports errors
//! 4. Prints the configuration file path

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use fleetsync_core::config::Config;

use crate::output::{get_formatter, OutputFormat};

/// Keys accepted by `config set`, with a short description
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("sync.startup_delay_ms", "Delay before the first pass"),
    ("sync.interval_secs", "Seconds between periodic passes"),
    ("sync.mutation_settle_ms", "Delay between a mutation and its pass"),
    ("sync.realtime", "true|false"),
    ("sync.collections", "Comma-separated collection names"),
    ("sync.profiles_table", "Remote profiles table"),
    ("sync.profiles_key", "Local profiles cache key"),
    ("sync.settings_table", "Remote settings table"),
    ("sync.settings_keys", "Comma-separated settings keys"),
    ("sync.deleted_records_key", "Settings key for deleted records"),
    ("remote.url", "Backend base URL, or 'none'"),
    ("remote.key", "Backend API key, or 'none'"),
    ("remote.request_timeout_secs", "Per-request timeout"),
    ("remote.realtime_poll_secs", "Seconds between change-feed polls"),
    ("remote.connectivity_probe_secs", "Seconds between reachability probes"),
    ("store.path", "Local replica database file"),
    ("logging.level", "trace|debug|info|warn|error"),
    ("logging.json", "true|false"),
];

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "sync.interval_secs")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let config_path = config
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::default_path);

        match self {
            ConfigCommand::Show => self.execute_show(config, &config_path, format).await,
            ConfigCommand::Set { key, value } => {
                self.execute_set(&config_path, key, value, format).await
            }
            ConfigCommand::Validate => self.execute_validate(&config_path, format).await,
            ConfigCommand::Path => {
                if format.is_json() {
                    get_formatter(format).print_json(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }));
                } else {
                    println!("{}", config_path.display());
                }
                Ok(())
            }
        }
    }

    /// Show the effective configuration, environment overrides included
    async fn execute_show(
        &self,
        explicit: Option<&Path>,
        config_path: &Path,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let mut config = Config::resolve(explicit)?;
        mask_key(&mut config);

        info!(config_path = %config_path.display(), "Showing configuration");

        if format.is_json() {
            let json = serde_json::to_value(&config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", config_path.display()));
            formatter.info("");

            let yaml = serde_yaml::to_string(&config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }

        Ok(())
    }

    /// Set a configuration value using dot-notation
    ///
    /// Works on the file contents only, so environment overrides are never
    /// written back.
    async fn execute_set(
        &self,
        config_path: &Path,
        key: &str,
        value: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let formatter = get_formatter(format);
        let mut config = Config::load_or_default(config_path);

        info!(key = %key, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{}': {}", key, e));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {:<36} - {}", name, help));
                }
            }
            return Ok(());
        }

        let errors: Vec<String> = config.validate().iter().map(ToString::to_string).collect();
        if !errors.is_empty() {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "errors": errors,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
            }
            return Ok(());
        }

        save_config(&config, config_path)?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "config_path": config_path.display().to_string(),
            }));
        } else {
            let shown = if key == "remote.key" { "********" } else { value };
            formatter.success(&format!("Set {} = {}", key, shown));
            formatter.info(&format!("Saved to {}", config_path.display()));
        }

        Ok(())
    }

    /// Validate configuration file
    async fn execute_validate(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let config = match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                let message = if config_path.exists() {
                    format!("Failed to parse configuration: {}", e)
                } else {
                    "Configuration file not found. Using defaults.".to_string()
                };
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": config_path.display().to_string(),
                        "errors": [message],
                    }));
                } else {
                    formatter.error(&message);
                    formatter.info(&format!("File: {}", config_path.display()));
                }
                return Ok(());
            }
        };

        info!(config_path = %config_path.display(), "Validating configuration");

        let errors = config.validate();

        if format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": config_path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", config_path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", config_path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(())
    }
}

fn mask_key(config: &mut Config) {
    if config.remote.key.is_some() {
        config.remote.key = Some("********".to_string());
    }
}

fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml).context("Failed to write configuration file")
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .with_context(|| format!("Expected a non-negative integer for {}", key))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse::<bool>()
        .with_context(|| format!("Expected true or false for {}", key))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Apply a dot-notation key/value pair to a Config struct
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- sync ---
        "sync.startup_delay_ms" => config.sync.startup_delay_ms = parse_u64(key, value)?,
        "sync.interval_secs" => config.sync.interval_secs = parse_u64(key, value)?,
        "sync.mutation_settle_ms" => config.sync.mutation_settle_ms = parse_u64(key, value)?,
        "sync.realtime" => config.sync.realtime = parse_bool(key, value)?,
        "sync.collections" => config.sync.collections = parse_list(value),
        "sync.profiles_table" => config.sync.profiles_table = value.to_string(),
        "sync.profiles_key" => config.sync.profiles_key = value.to_string(),
        "sync.settings_table" => config.sync.settings_table = value.to_string(),
        "sync.settings_keys" => config.sync.settings_keys = parse_list(value),
        "sync.deleted_records_key" => config.sync.deleted_records_key = value.to_string(),

        // --- remote ---
        "remote.url" => config.remote.url = optional(value),
        "remote.key" => config.remote.key = optional(value),
        "remote.request_timeout_secs" => {
            config.remote.request_timeout_secs = parse_u64(key, value)?
        }
        "remote.realtime_poll_secs" => config.remote.realtime_poll_secs = parse_u64(key, value)?,
        "remote.connectivity_probe_secs" => {
            config.remote.connectivity_probe_secs = parse_u64(key, value)?
        }

        // --- store ---
        "store.path" => config.store.path = PathBuf::from(value),

        // --- logging ---
        "logging.level" => config.logging.level = value.to_string(),
        "logging.json" => config.logging.json = parse_bool(key, value)?,

        _ => anyhow::bail!("Unknown configuration key: '{}'", key),
    }

    Ok(())
}
