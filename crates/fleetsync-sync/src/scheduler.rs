//! Trigger scheduler - turns external events into sync passes
//!
//! The [`TriggerScheduler`] listens to four sources and asks the
//! [`SyncOrchestrator`] for a pass on each:
//!
//! ```text
//! startup delay ───┐
//! interval timer ──┤
//! remote changes ──┼──→ TriggerScheduler ──→ spawn run_pass()
//! local mutations ─┘        (settle delay)
//! ```
//!
//! Each pass runs in its own task, so triggers never queue behind one
//! another. Overlapping passes are resolved by the orchestrator's lock: the
//! loser is a no-op and the next trigger catches up.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleetsync_core::config::SyncConfig;
use fleetsync_core::domain::{ChangeNotification, EventMask, MutationEvent, MutationKind};
use fleetsync_core::ports::Subscription;

use crate::orchestrator::{PassOutcome, SyncOrchestrator};

// ============================================================================
// Trigger
// ============================================================================

/// What caused a pass to be requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Startup,
    Interval,
    RemoteChange { table: String },
    Mutation(MutationKind),
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Startup => f.write_str("startup"),
            Self::Interval => f.write_str("interval"),
            Self::RemoteChange { table } => write!(f, "remote change on {}", table),
            Self::Mutation(kind) => write!(f, "local {}", kind),
        }
    }
}

// ============================================================================
// TriggerScheduler
// ============================================================================

/// Drives the orchestrator from startup, timer, remote and mutation triggers
pub struct TriggerScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    startup_delay: Duration,
    interval: Duration,
    settle: Duration,
    realtime: bool,
    watched_tables: Vec<String>,
    mutations: Option<broadcast::Receiver<MutationEvent>>,
    cancel: CancellationToken,
    passes: JoinSet<PassOutcome>,
}

impl TriggerScheduler {
    /// Creates a scheduler using the timings in `config`
    pub fn new(
        orchestrator: Arc<SyncOrchestrator>,
        config: &SyncConfig,
        cancel: CancellationToken,
    ) -> Self {
        let mut watched_tables = config.collections.clone();
        watched_tables.push(config.profiles_table.clone());

        Self {
            orchestrator,
            startup_delay: Duration::from_millis(config.startup_delay_ms),
            interval: Duration::from_secs(config.interval_secs),
            settle: Duration::from_millis(config.mutation_settle_ms),
            realtime: config.realtime,
            watched_tables,
            mutations: None,
            cancel,
            passes: JoinSet::new(),
        }
    }

    /// Listens to local mutation events
    pub fn with_mutations(mut self, receiver: broadcast::Receiver<MutationEvent>) -> Self {
        self.mutations = Some(receiver);
        self
    }

    /// Runs until the cancellation token fires, then waits for in-flight passes
    pub async fn run(mut self) {
        info!(
            startup_delay_ms = self.startup_delay.as_millis() as u64,
            interval_secs = self.interval.as_secs(),
            realtime = self.realtime,
            "Trigger scheduler starting"
        );

        let mut subscription = self.subscribe().await;

        let startup = tokio::time::sleep(self.startup_delay);
        tokio::pin!(startup);
        let mut started = false;

        let mut timer = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,

                _ = &mut startup, if !started => {
                    started = true;
                    self.dispatch(Trigger::Startup, Duration::ZERO);
                }

                _ = timer.tick() => self.dispatch(Trigger::Interval, Duration::ZERO),

                notification = next_notification(&mut subscription) => match notification {
                    Some(change) => self.dispatch(Trigger::RemoteChange { table: change.table }, Duration::ZERO),
                    None => {
                        warn!("Remote change feed closed");
                        subscription = None;
                    }
                },

                event = next_mutation(&mut self.mutations) => match event {
                    Ok(event) => self.dispatch(Trigger::Mutation(event.kind), self.settle),
                    Err(RecvError::Lagged(missed)) => {
                        debug!(missed, "Mutation events lagged, syncing once");
                        self.dispatch(Trigger::Mutation(MutationKind::Save), self.settle);
                    }
                    Err(RecvError::Closed) => {
                        debug!("Mutation channel closed");
                        self.mutations = None;
                    }
                },

                Some(joined) = self.passes.join_next(), if !self.passes.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Sync pass task failed");
                    }
                }
            }
        }

        info!(in_flight = self.passes.len(), "Trigger scheduler stopping");
        while let Some(joined) = self.passes.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Sync pass task failed");
            }
        }
        drop(subscription);
        info!("Trigger scheduler stopped");
    }

    /// Subscribes to remote changes if enabled and a remote is installed
    async fn subscribe(&self) -> Option<Subscription> {
        if !self.realtime {
            return None;
        }
        let remote = self.orchestrator.remote()?;
        match remote.subscribe(&self.watched_tables, EventMask::All).await {
            Ok(subscription) => {
                info!(tables = ?self.watched_tables, "Subscribed to remote changes");
                Some(subscription)
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Remote change subscription failed");
                None
            }
        }
    }

    /// Spawns a pass after `delay`; a cancelled delay drops the trigger
    fn dispatch(&mut self, trigger: Trigger, delay: Duration) {
        debug!(trigger = %trigger, delay_ms = delay.as_millis() as u64, "Sync triggered");
        let orchestrator = Arc::clone(&self.orchestrator);
        let cancel = self.cancel.clone();

        self.passes.spawn(async move {
            if !delay.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return PassOutcome::Failed { message: format!("{trigger} cancelled") };
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            let outcome = orchestrator.run_pass().await;
            debug!(trigger = %trigger, ?outcome, "Triggered pass finished");
            outcome
        });
    }
}

async fn next_notification(subscription: &mut Option<Subscription>) -> Option<ChangeNotification> {
    match subscription {
        Some(s) => s.notifications.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_mutation(
    receiver: &mut Option<broadcast::Receiver<MutationEvent>>,
) -> Result<MutationEvent, RecvError> {
    match receiver {
        Some(r) => r.recv().await,
        None => std::future::pending().await,
    }
}
