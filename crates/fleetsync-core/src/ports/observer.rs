//! Sync observer port (driven/secondary port)
//!
//! UI collaborators that react to a sync pass: collection renderers, the
//! stats panel, toasts and the status indicator. Every method is
//! best-effort and defaults to a no-op, so an implementation only overrides
//! what it can display. Absence of a UI is modeled by [`NoopObserver`].

use crate::domain::{Entity, SyncStatus, ToastSeverity};

/// Port trait for UI side effects triggered by synchronization
pub trait ISyncObserver: Send + Sync {
    /// Re-renders a collection after it was merged
    fn render_collection(&self, _collection: &str, _entities: &[Entity]) {}

    /// Re-renders the history view
    fn render_history(&self, _entities: &[Entity]) {}

    /// Refreshes aggregate statistics
    fn update_stats(&self) {}

    /// Shows a transient notification
    fn show_toast(&self, _message: &str, _severity: ToastSeverity) {}

    /// Updates the status indicator
    fn update_status(&self, _status: SyncStatus) {}
}

/// Observer that ignores every callback
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ISyncObserver for NoopObserver {}
