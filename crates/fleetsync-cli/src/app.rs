//! Wiring shared by every command that touches the replica
//!
//! Opens the configured SQLite replica and, for commands that sync, builds
//! an orchestrator with a one-shot connectivity probe in place of the
//! daemon's background monitor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use fleetsync_cache::{DatabasePool, SqliteLocalStore};
use fleetsync_core::config::{Config, ENV_REMOTE_KEY, ENV_REMOTE_URL};
use fleetsync_core::ports::ISyncObserver;
use fleetsync_core::usecases::{LocalReplica, RecordMutations};
use fleetsync_remote::{NetworkMonitor, RestRemoteReplica};
use fleetsync_sync::SyncOrchestrator;

/// Loads and validates the configuration a command runs with
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::resolve(path)?;
    let errors = config.validate();
    if !errors.is_empty() {
        let joined = errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::bail!("Invalid configuration: {}", joined);
    }
    Ok(config)
}

/// The opened local replica plus the configuration it was opened with
pub struct App {
    pub config: Config,
    pub config_path: PathBuf,
    pub pool: DatabasePool,
    pub store: SqliteLocalStore,
    pub replica: LocalReplica,
}

impl App {
    /// Loads the configuration and opens the replica at `store.path`
    pub async fn open(config_path: Option<&Path>) -> Result<Self> {
        let config = load_config(config_path)?;
        let pool = DatabasePool::new(&config.store.path)
            .await
            .with_context(|| {
                format!("Failed to open local replica at {}", config.store.path.display())
            })?;
        let store = SqliteLocalStore::new(pool.pool().clone());
        let replica = LocalReplica::new(Arc::new(store.clone()));

        Ok(Self {
            config,
            config_path: config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path),
            pool,
            store,
            replica,
        })
    }

    /// Mutations over `collection`, or the first configured collection
    pub fn mutations(&self, collection: Option<&str>) -> Result<RecordMutations> {
        let collection = match collection {
            Some(name) => {
                if !self.config.sync.collections.iter().any(|c| c == name) {
                    anyhow::bail!("Unknown collection: {}", name);
                }
                name.to_string()
            }
            None => self
                .config
                .sync
                .collections
                .first()
                .cloned()
                .context("No collections configured")?,
        };
        Ok(RecordMutations::new(
            self.replica.clone(),
            collection,
            self.config.sync.deleted_records_key.clone(),
        ))
    }

    /// Whether remote credentials are present
    pub fn has_remote(&self) -> bool {
        self.config.remote.credentials().is_some()
    }

    /// Builds an initialized orchestrator after probing the backend once
    pub async fn orchestrator(&self, observer: Arc<dyn ISyncObserver>) -> Result<SyncOrchestrator> {
        let remote = RestRemoteReplica::from_config(&self.config.remote).with_context(|| {
            format!(
                "Set remote.url and remote.key, or {} and {}",
                ENV_REMOTE_URL, ENV_REMOTE_KEY
            )
        })?;

        let monitor = NetworkMonitor::new();
        monitor.probe_once(remote.client()).await;

        let orchestrator = SyncOrchestrator::new(
            self.replica.clone(),
            Arc::new(monitor),
            observer,
            self.config.sync.clone(),
        );
        orchestrator.initialize(Arc::new(remote))?;
        Ok(orchestrator)
    }
}
