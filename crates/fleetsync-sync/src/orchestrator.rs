//! Sync orchestrator
//!
//! The [`SyncOrchestrator`] runs one synchronization pass at a time:
//!
//! 1. **Collections**: assign provisional ids, read remote rows, merge, persist
//!    the unified collection, notify the UI, then push the winners
//! 2. **Profiles**: replace the local cache with the remote table
//! 3. **Settings**: reconcile each key as a whole value
//!
//! ## Preconditions
//!
//! A pass starts only when a remote replica is installed, no other pass
//! holds the [`SyncLock`], and connectivity reports online. All three checks
//! happen before the first suspension point. Failing one is a silent skip:
//! no status change, no remote call.
//!
//! ## Failure
//!
//! The first error aborts the rest of the pass. Everything already written
//! locally stays written. The status goes to `error`, a toast carries the
//! message, and the error is not propagated: the next trigger simply tries
//! again.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use fleetsync_core::config::SyncConfig;
use fleetsync_core::domain::{SyncStatus, Timestamp, ToastSeverity};
use fleetsync_core::ports::{IConnectivity, IRemoteReplica, ISyncObserver};
use fleetsync_core::usecases::LocalReplica;
use fleetsync_merge::{IdentityAssigner, MergeEngine, SettingDecision, SettingsReconciler};

use crate::lock::SyncLock;
use crate::SyncError;

// ============================================================================
// Pass results
// ============================================================================

/// Why a pass did not start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No remote replica has been installed
    NotInitialized,
    /// Another pass holds the lock
    AlreadyRunning,
    /// Connectivity reports offline
    Offline,
}

/// Per-collection results of a pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionReport {
    pub collection: String,
    /// Provisional identities minted this pass
    pub identities_assigned: usize,
    /// Records in the unified collection
    pub total: usize,
    pub remote_only: usize,
    pub local_only: usize,
    pub local_wins: usize,
    pub remote_wins: usize,
    /// Rows sent in the batched upsert
    pub pushed: usize,
}

/// Summary of a completed pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub collections: Vec<CollectionReport>,
    /// Profiles cached this pass; `None` when the cache was left alone
    pub profiles_cached: Option<usize>,
    pub settings_pulled: Vec<String>,
    pub settings_pushed: Vec<String>,
    pub duration_ms: u64,
}

/// What happened when a pass was requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    Skipped { reason: SkipReason },
    Completed(PassReport),
    Failed { message: String },
}

impl PassOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

// ============================================================================
// SyncOrchestrator
// ============================================================================

/// Runs synchronization passes between the local and remote replicas
pub struct SyncOrchestrator {
    remote: OnceLock<Arc<dyn IRemoteReplica>>,
    connectivity: Arc<dyn IConnectivity>,
    replica: LocalReplica,
    observer: Arc<dyn ISyncObserver>,
    config: SyncConfig,
    lock: SyncLock,
}

impl SyncOrchestrator {
    /// Creates an orchestrator with no remote installed
    ///
    /// Passes are skipped until [`initialize`](Self::initialize) succeeds.
    pub fn new(
        replica: LocalReplica,
        connectivity: Arc<dyn IConnectivity>,
        observer: Arc<dyn ISyncObserver>,
        config: SyncConfig,
    ) -> Self {
        Self {
            remote: OnceLock::new(),
            connectivity,
            replica,
            observer,
            config,
            lock: SyncLock::new(),
        }
    }

    /// Installs the remote replica; only the first call takes effect
    pub fn initialize(&self, remote: Arc<dyn IRemoteReplica>) -> Result<(), SyncError> {
        self.remote
            .set(remote)
            .map_err(|_| SyncError::AlreadyInitialized)?;
        info!("Remote replica initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.remote.get().is_some()
    }

    /// Whether a pass is in progress
    pub fn is_running(&self) -> bool {
        self.lock.is_held()
    }

    /// The installed remote replica
    pub fn remote(&self) -> Option<Arc<dyn IRemoteReplica>> {
        self.remote.get().cloned()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Runs one pass if every precondition holds
    ///
    /// Never returns an error: failures are reported to the observer and
    /// described in the returned [`PassOutcome`].
    #[tracing::instrument(skip(self))]
    pub async fn run_pass(&self) -> PassOutcome {
        let Some(remote) = self.remote.get().cloned() else {
            debug!("Skipping pass: remote not initialized");
            return PassOutcome::Skipped {
                reason: SkipReason::NotInitialized,
            };
        };
        if !self.connectivity.is_online() {
            debug!("Skipping pass: offline");
            return PassOutcome::Skipped {
                reason: SkipReason::Offline,
            };
        }
        let Some(_guard) = self.lock.try_acquire() else {
            debug!("Skipping pass: another pass is running");
            return PassOutcome::Skipped {
                reason: SkipReason::AlreadyRunning,
            };
        };

        let started = Instant::now();
        self.observer.update_status(SyncStatus::Syncing);
        info!("Sync pass started");

        match self.run_steps(remote.as_ref()).await {
            Ok(mut report) => {
                report.duration_ms = started.elapsed().as_millis() as u64;
                self.observer.update_status(SyncStatus::Ok);
                info!(
                    collections = report.collections.len(),
                    pushed = report.collections.iter().map(|c| c.pushed).sum::<usize>(),
                    settings_pulled = report.settings_pulled.len(),
                    settings_pushed = report.settings_pushed.len(),
                    duration_ms = report.duration_ms,
                    "Sync pass completed"
                );
                PassOutcome::Completed(report)
            }
            Err(e) => {
                let message = format!("{e:#}");
                error!(error = %message, "Sync pass failed");
                self.observer
                    .show_toast(&format!("Sync error: {message}"), ToastSeverity::Error);
                self.observer.update_status(SyncStatus::Error);
                PassOutcome::Failed { message }
            }
        }
    }

    async fn run_steps(&self, remote: &dyn IRemoteReplica) -> Result<PassReport> {
        let mut report = PassReport::default();

        for collection in &self.config.collections {
            let collection_report = self.sync_collection(remote, collection).await?;
            report.collections.push(collection_report);
        }

        report.profiles_cached = self.sync_profiles(remote).await?;

        for key in &self.config.settings_keys {
            match self.sync_setting(remote, key).await? {
                SettingDecision::PullRemote { .. } => report.settings_pulled.push(key.clone()),
                SettingDecision::PushLocal(_) | SettingDecision::CreateRemote(_) => {
                    report.settings_pushed.push(key.clone())
                }
                SettingDecision::Noop => {}
            }
        }

        Ok(report)
    }

    /// Identity assignment, merge, local persist, UI refresh, push
    async fn sync_collection(
        &self,
        remote: &dyn IRemoteReplica,
        collection: &str,
    ) -> Result<CollectionReport> {
        let now = Timestamp::now();

        let mut local = self.replica.load_collection(collection).await?;
        let identities_assigned = IdentityAssigner::assign(&mut local, now);
        if identities_assigned > 0 {
            self.replica.save_collection(collection, &local).await?;
            debug!(collection, identities_assigned, "Persisted provisional identities");
        }

        let rows = remote.read_rows(collection).await?;
        let outcome = MergeEngine::merge(local, rows, now);

        self.replica
            .save_collection(collection, &outcome.unified)
            .await?;

        self.observer.render_collection(collection, &outcome.unified);
        self.observer.render_history(&outcome.unified);
        self.observer.update_stats();

        let pushed = outcome.push.len();
        if pushed > 0 {
            self.observer
                .show_toast(&format!("{pushed} records syncing"), ToastSeverity::Info);
            remote
                .upsert_rows(collection, &outcome.push)
                .await
                .with_context(|| format!("Failed to push {pushed} records of {collection}"))?;
        }

        let stats = outcome.stats;
        debug!(collection, ?stats, pushed, "Collection synchronized");

        Ok(CollectionReport {
            collection: collection.to_string(),
            identities_assigned,
            total: outcome.unified.len(),
            remote_only: stats.remote_only,
            local_only: stats.local_only,
            local_wins: stats.local_wins,
            remote_wins: stats.remote_wins,
            pushed,
        })
    }

    /// Fetch-and-replace of the remote-authoritative profiles cache
    ///
    /// A failed read or an empty table leaves the cache untouched.
    async fn sync_profiles(&self, remote: &dyn IRemoteReplica) -> Result<Option<usize>> {
        let table = &self.config.profiles_table;
        let rows = match remote.read_documents(table).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!(table = %table, error = %format!("{e:#}"), "Could not read profiles, keeping cache");
                return Ok(None);
            }
        };

        if rows.is_empty() {
            debug!(table = %table, "Remote profiles empty, keeping cache");
            return Ok(None);
        }

        self.replica
            .save_profiles(&self.config.profiles_key, &rows)
            .await?;
        debug!(count = rows.len(), "Profiles cache replaced");
        Ok(Some(rows.len()))
    }

    /// Whole-value reconciliation of one settings key
    async fn sync_setting(&self, remote: &dyn IRemoteReplica, key: &str) -> Result<SettingDecision> {
        let table = &self.config.settings_table;
        let remote_row = remote.read_setting(table, key).await?;
        let local = self.replica.load_setting(key).await?;

        let decision = SettingsReconciler::decide(key, remote_row.as_ref(), &local, Timestamp::now());
        match &decision {
            SettingDecision::PullRemote { value, updated_at } => {
                self.replica.store_setting(key, value, updated_at).await?;
                debug!(key, "Setting pulled from remote");
            }
            SettingDecision::PushLocal(row) => {
                remote.upsert_setting(table, row).await?;
                debug!(key, "Setting pushed to remote");
            }
            SettingDecision::CreateRemote(row) => {
                remote.upsert_setting(table, row).await?;
                let stamp = row.updated_at().to_iso_string();
                self.replica.store_setting_stamp(key, &stamp).await?;
                debug!(key, "Setting created on remote");
            }
            SettingDecision::Noop => {}
        }
        Ok(decision)
    }
}
