//! Local replica store port (driven/secondary port)
//!
//! A durable key-value store holding JSON-serialized collections and
//! settings. Values are opaque strings; interpretation happens in
//! [`crate::usecases::LocalReplica`].

/// Port trait for the local key-value store
///
/// Implementations must survive process restarts. Failures are not expected
/// in normal operation but are still surfaced as `anyhow::Error`.
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    /// Returns the stored string for `key`, or `None` if absent
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}
