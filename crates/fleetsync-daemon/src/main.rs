//! FleetSync Daemon - Background synchronization service
//!
//! This binary runs as a user service and handles:
//! - Two-way sync of the local replica with the remote backend
//! - Startup, interval and remote-change triggers
//! - Connectivity monitoring
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the SQLite replica, installs the REST remote when
//! credentials are configured, and hands control to the
//! [`TriggerScheduler`]. Everything is stopped through one
//! `CancellationToken` that is triggered on receipt of SIGTERM or SIGINT.

mod observer;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use fleetsync_cache::{DatabasePool, SqliteLocalStore};
use fleetsync_core::{
    config::{Config, LoggingConfig},
    usecases::LocalReplica,
};
use fleetsync_remote::{NetworkMonitor, RestRemoteReplica};
use fleetsync_sync::{SyncOrchestrator, TriggerScheduler};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::observer::TracingObserver;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(name = "fleetsyncd", version, about = "FleetSync background synchronization daemon")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

// ============================================================================
// DaemonService
// ============================================================================

/// Main daemon service that owns the replica and drives synchronization
struct DaemonService {
    config: Config,
    replica: LocalReplica,
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the local replica described by `config`
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let pool = DatabasePool::new(&config.store.path)
            .await
            .context("Failed to open local replica")?;
        let replica = LocalReplica::new(Arc::new(SqliteLocalStore::new(pool.pool().clone())));

        Ok(Self {
            config,
            replica,
            shutdown,
        })
    }

    /// Runs until shutdown
    ///
    /// A missing or invalid remote is reported once; the scheduler still runs
    /// and every pass is skipped as uninitialized.
    async fn run(&self) -> Result<()> {
        let monitor = NetworkMonitor::new();
        let orchestrator = Arc::new(SyncOrchestrator::new(
            self.replica.clone(),
            Arc::new(monitor.clone()),
            Arc::new(TracingObserver),
            self.config.sync.clone(),
        ));

        match RestRemoteReplica::from_config(&self.config.remote) {
            Ok(remote) => {
                monitor.spawn(
                    remote.client().clone(),
                    Duration::from_secs(self.config.remote.connectivity_probe_secs),
                    self.shutdown.child_token(),
                );
                let host = remote.client().host().unwrap_or_default();
                info!(host = %host, "Remote replica configured");
                orchestrator.initialize(Arc::new(remote))?;
            }
            Err(e) => {
                error!(
                    error = %format!("{e:#}"),
                    "Remote replica unavailable; running without sync"
                );
            }
        }

        TriggerScheduler::new(orchestrator, &self.config.sync, self.shutdown.clone())
            .run()
            .await;
        Ok(())
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

/// Installs the global subscriber; `RUST_LOG` overrides the configured level
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

/// Resolves and validates the configuration
fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let config = Config::resolve(path)?;
    let errors = config.validate();
    if !errors.is_empty() {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration: {}", details.join("; "));
    }
    Ok(config)
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    init_tracing(&config.logging);
    info!(
        store = %config.store.path.display(),
        "FleetSync daemon starting (fleetsyncd)"
    );

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("FleetSync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "FleetSync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
