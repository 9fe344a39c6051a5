//! Remote replica port (driven/secondary port)
//!
//! This module defines the interface for the remote authoritative store.
//! The primary implementation targets a PostgREST-style REST backend, but
//! the trait only assumes bulk reads, batched upserts keyed by identity,
//! single-key settings rows and a change subscription.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and the orchestrator only needs the message.
//! - Uses `#[async_trait]` for async trait methods.
//! - Timeouts are the adapter's responsibility; callers never wrap calls in
//!   their own deadlines.

use tokio::sync::mpsc;

use crate::domain::{ChangeNotification, EventMask, RemoteRow, SettingRow};

// ============================================================================
// SubscriptionHandle
// ============================================================================

/// RAII handle for an active change subscription
///
/// When this handle is dropped, the associated change feed is stopped.
pub struct SubscriptionHandle {
    stop_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    /// Creates a new handle with the given stop callback
    ///
    /// The callback will be invoked exactly once.
    pub fn new(stop_fn: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop_fn: Some(Box::new(stop_fn)),
        }
    }

    /// A handle with nothing to stop
    pub fn noop() -> Self {
        Self { stop_fn: None }
    }

    /// Explicitly stops the subscription, consuming the handle
    pub fn stop(mut self) {
        if let Some(stop_fn) = self.stop_fn.take() {
            stop_fn();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(stop_fn) = self.stop_fn.take() {
            stop_fn();
        }
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.stop_fn.is_some())
            .finish()
    }
}

/// A live stream of change notifications plus the handle that keeps it alive
///
/// Delivery is at-least-once with no ordering guarantee; consumers should
/// treat every notification as "something changed, resync eventually".
#[derive(Debug)]
pub struct Subscription {
    pub notifications: mpsc::Receiver<ChangeNotification>,
    pub handle: SubscriptionHandle,
}

// ============================================================================
// IRemoteReplica trait
// ============================================================================

/// Port trait for the remote authoritative replica
#[async_trait::async_trait]
pub trait IRemoteReplica: Send + Sync {
    /// Reads every row of a collection table
    async fn read_rows(&self, table: &str) -> anyhow::Result<Vec<RemoteRow>>;

    /// Upserts rows by `id` in a single batched request
    async fn upsert_rows(&self, table: &str, rows: &[RemoteRow]) -> anyhow::Result<()>;

    /// Reads every row of a table whose rows are opaque JSON documents
    ///
    /// Used for read-mostly tables such as user profiles.
    async fn read_documents(&self, table: &str) -> anyhow::Result<Vec<serde_json::Value>>;

    /// Reads one settings row by key
    ///
    /// # Returns
    /// `None` if no row with this key exists
    async fn read_setting(&self, table: &str, key: &str) -> anyhow::Result<Option<SettingRow>>;

    /// Upserts one settings row by key
    async fn upsert_setting(&self, table: &str, row: &SettingRow) -> anyhow::Result<()>;

    /// Subscribes to change notifications for the named tables
    ///
    /// # Arguments
    /// * `tables` - Tables to observe
    /// * `mask` - Which change kinds to deliver
    async fn subscribe(&self, tables: &[String], mask: EventMask) -> anyhow::Result<Subscription>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_handle_stops_once_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = SubscriptionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_stop_does_not_double_fire() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handle = SubscriptionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        handle.stop();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
