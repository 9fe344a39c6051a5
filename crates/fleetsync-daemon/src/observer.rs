//! Observer that reports sync side effects to the log
//!
//! The daemon has no screen; every UI callback becomes a tracing event.

use tracing::{debug, error, info, warn};

use fleetsync_core::domain::{Entity, SyncStatus, ToastSeverity};
use fleetsync_core::ports::ISyncObserver;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ISyncObserver for TracingObserver {
    fn render_collection(&self, collection: &str, entities: &[Entity]) {
        debug!(collection, count = entities.len(), "Collection refreshed");
    }

    fn show_toast(&self, message: &str, severity: ToastSeverity) {
        match severity {
            ToastSeverity::Error => error!(%message, "Sync notice"),
            ToastSeverity::Warning => warn!(%message, "Sync notice"),
            ToastSeverity::Info | ToastSeverity::Success => info!(%message, "Sync notice"),
        }
    }

    fn update_status(&self, status: SyncStatus) {
        info!(status = %status, "Sync status");
    }
}
