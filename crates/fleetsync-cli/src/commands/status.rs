//! Status command - Display replica and remote status
//!
//! Provides the `fleetsync status` CLI command which shows:
//! 1. Where the configuration and replica live
//! 2. Record counts per collection and in the deleted-records setting
//! 3. Cached profiles and settings timestamps
//! 4. Remote configuration and, with `--probe`, reachability

use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde_json::{json, Value};

use fleetsync_remote::{NetworkMonitor, RestRemoteReplica};

use crate::app::App;
use crate::output::{get_formatter, plural, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Check whether the remote answers
    #[arg(long)]
    pub probe: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let app = App::open(config).await?;
        let status = self.collect(&app).await?;

        if format.is_json() {
            formatter.print_json(&status);
            return Ok(());
        }

        formatter.info(&format!("Config:  {}", app.config_path.display()));
        formatter.info(&format!("Replica: {}", app.config.store.path.display()));
        match status["remote"]["url"].as_str() {
            Some(url) => formatter.info(&format!("Remote:  {}", url)),
            None => formatter.warn("Remote not configured; changes stay local"),
        }
        match status["remote"]["reachable"].as_bool() {
            Some(true) => formatter.success("Remote is reachable"),
            Some(false) => formatter.error("Remote is unreachable"),
            None => {}
        }

        println!();
        println!("Collections:");
        for c in status["collections"].as_array().into_iter().flatten() {
            let total = c["records"].as_u64().unwrap_or(0) as usize;
            let provisional = c["provisional"].as_u64().unwrap_or(0) as usize;
            let unkeyed = c["without_id"].as_u64().unwrap_or(0) as usize;
            formatter.info(&format!(
                "{:<24} {} ({} provisional, {} without id)",
                c["name"].as_str().unwrap_or_default(),
                plural(total, "record"),
                provisional,
                unkeyed
            ));
        }
        formatter.info(&format!(
            "{:<24} {}",
            "deleted",
            plural(status["deleted_records"].as_u64().unwrap_or(0) as usize, "record")
        ));
        formatter.info(&format!(
            "{:<24} {}",
            "profiles",
            plural(status["profiles"].as_u64().unwrap_or(0) as usize, "profile")
        ));

        println!();
        println!("Settings:");
        for s in status["settings"].as_array().into_iter().flatten() {
            formatter.info(&format!(
                "{:<24} {}",
                s["key"].as_str().unwrap_or_default(),
                s["updated_at"].as_str().unwrap_or("never")
            ));
        }
        Ok(())
    }

    /// Gathers status as one JSON document
    async fn collect(&self, app: &App) -> Result<Value> {
        let sync = &app.config.sync;

        let mut collections = Vec::new();
        for name in &sync.collections {
            let records = app.replica.load_collection(name).await?;
            let provisional = records
                .iter()
                .filter(|r| r.identity().is_some_and(|id| id.is_provisional()))
                .count();
            let without_id = records.iter().filter(|r| r.backend_id().is_none()).count();
            collections.push(json!({
                "name": name,
                "records": records.len(),
                "provisional": provisional,
                "without_id": without_id,
            }));
        }

        let deleted = app.mutations(None)?.list_deleted().await?.len();
        let profiles = app.replica.load_profiles(&sync.profiles_key).await?.len();

        let mut settings = Vec::new();
        for key in &sync.settings_keys {
            let setting = app.replica.load_setting(key).await?;
            settings.push(json!({
                "key": key,
                "present": setting.value.is_some(),
                "updated_at": setting.updated_at,
            }));
        }

        let store_bytes: usize = app.store.entries().await?.iter().map(|e| e.bytes).sum();
        let schema_version = app.pool.schema_version().await?;

        let reachable = if self.probe {
            match RestRemoteReplica::from_config(&app.config.remote) {
                Ok(remote) => Some(NetworkMonitor::new().probe_once(remote.client()).await),
                Err(_) => None,
            }
        } else {
            None
        };

        Ok(json!({
            "config_path": app.config_path.display().to_string(),
            "store": {
                "path": app.config.store.path.display().to_string(),
                "bytes": store_bytes,
                "schema_version": schema_version,
            },
            "remote": {
                "url": app.config.remote.credentials().map(|(url, _)| url),
                "reachable": reachable,
            },
            "collections": collections,
            "deleted_records": deleted,
            "profiles": profiles,
            "settings": settings,
        }))
    }
}
