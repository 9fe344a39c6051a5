//! Sync command - Run one synchronization pass
//!
//! Provides the `fleetsync sync` CLI command which:
//! 1. Loads configuration and opens the local replica
//! 2. Probes the remote once for reachability
//! 3. Runs a single pass through the orchestrator and reports the outcome

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use fleetsync_core::domain::ToastSeverity;
use fleetsync_core::ports::ISyncObserver;
use fleetsync_sync::{PassOutcome, PassReport, SkipReason};

use crate::app::App;
use crate::output::{get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let app = App::open(config).await?;
        info!(config_path = %app.config_path.display(), "Loaded configuration");

        let outcome = run_pass(&app, format).await?;
        report_outcome(&outcome, format, &*formatter);
        if let PassOutcome::Failed { message } = outcome {
            anyhow::bail!("Sync failed: {}", message);
        }
        Ok(())
    }
}

/// Builds an orchestrator for `app` and runs one pass
pub(crate) async fn run_pass(app: &App, format: OutputFormat) -> Result<PassOutcome> {
    let orchestrator = app
        .orchestrator(Arc::new(ConsoleObserver::new(format)))
        .await?;
    Ok(orchestrator.run_pass().await)
}

/// Prints a pass outcome
pub(crate) fn report_outcome(outcome: &PassOutcome, format: OutputFormat, formatter: &dyn OutputFormatter) {
    if format.is_json() {
        formatter.print_json(&serde_json::to_value(outcome).unwrap_or_default());
        return;
    }

    match outcome {
        PassOutcome::Skipped { reason } => formatter.warn(match reason {
            SkipReason::Offline => "Remote is unreachable; sync skipped",
            SkipReason::AlreadyRunning => "Another sync is in progress; sync skipped",
            SkipReason::NotInitialized => "Remote is not configured; sync skipped",
        }),
        PassOutcome::Completed(report) => print_report(report, formatter),
        PassOutcome::Failed { .. } => {}
    }
}

fn print_report(report: &PassReport, formatter: &dyn OutputFormatter) {
    let duration = if report.duration_ms >= 1000 {
        format!("{:.1}s", report.duration_ms as f64 / 1000.0)
    } else {
        format!("{}ms", report.duration_ms)
    };
    formatter.success(&format!("Sync completed in {}", duration));

    for c in &report.collections {
        formatter.info(&format!(
            "{}: {} total, {} pulled, {} pushed",
            c.collection,
            plural(c.total, "record"),
            c.remote_only + c.remote_wins,
            c.pushed
        ));
        if c.identities_assigned > 0 {
            formatter.info(&format!(
                "  {} assigned a provisional id",
                plural(c.identities_assigned, "record")
            ));
        }
    }
    if let Some(count) = report.profiles_cached {
        formatter.info(&format!("Profiles: {} cached", count));
    }
    if !report.settings_pulled.is_empty() {
        formatter.info(&format!("Settings pulled: {}", report.settings_pulled.join(", ")));
    }
    if !report.settings_pushed.is_empty() {
        formatter.info(&format!("Settings pushed: {}", report.settings_pushed.join(", ")));
    }
}

// ============================================================================
// ConsoleObserver
// ============================================================================

/// Shows toasts on the terminal; everything else goes to the log
pub(crate) struct ConsoleObserver {
    formatter: Box<dyn OutputFormatter>,
}

impl ConsoleObserver {
    pub(crate) fn new(format: OutputFormat) -> Self {
        Self {
            formatter: get_formatter(format),
        }
    }
}

impl ISyncObserver for ConsoleObserver {
    fn show_toast(&self, message: &str, severity: ToastSeverity) {
        match severity {
            ToastSeverity::Error => self.formatter.error(message),
            ToastSeverity::Warning => self.formatter.warn(message),
            ToastSeverity::Info => self.formatter.info(message),
            ToastSeverity::Success => self.formatter.success(message),
        }
    }
}
