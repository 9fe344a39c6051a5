//! RestRemoteReplica - IRemoteReplica implementation for the REST backend
//!
//! Wraps the [`RestClient`] and the [`ChangeFeed`] to fulfil the
//! [`IRemoteReplica`] port contract.
//!
//! ## Design Notes
//!
//! - Collection tables hold `{id, data, updated_at}` rows and are upserted on
//!   `id`; the settings table holds `{key, value, updated_at}` and is upserted
//!   on `key`.
//! - An empty settings result means "no row", not an error.
//! - `subscribe` spawns a polling feed on the current runtime; dropping the
//!   returned handle cancels it.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use fleetsync_core::config::RemoteConfig;
use fleetsync_core::domain::{EventMask, RemoteRow, SettingRow};
use fleetsync_core::ports::{IRemoteReplica, Subscription, SubscriptionHandle};

use crate::client::RestClient;
use crate::realtime::ChangeFeed;

/// Buffer of undelivered change notifications per subscription
const NOTIFICATION_BUFFER: usize = 64;

/// Remote replica backed by a PostgREST-style REST API
#[derive(Debug, Clone)]
pub struct RestRemoteReplica {
    client: RestClient,
    poll_interval: Duration,
}

impl RestRemoteReplica {
    /// Creates a replica over an existing client
    pub fn new(client: RestClient, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    /// Builds a replica from configuration
    ///
    /// # Errors
    /// Fails when the URL or key is missing or the URL is malformed. Callers
    /// treat this as "no remote": sync passes become no-ops.
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let (url, key) = config
            .credentials()
            .context("Remote URL and key are not configured")?;
        let client = RestClient::new(url, key, Duration::from_secs(config.request_timeout_secs))?;
        Ok(Self::new(
            client,
            Duration::from_secs(config.realtime_poll_secs),
        ))
    }

    /// Returns the underlying client
    pub fn client(&self) -> &RestClient {
        &self.client
    }
}

#[async_trait::async_trait]
impl IRemoteReplica for RestRemoteReplica {
    async fn read_rows(&self, table: &str) -> Result<Vec<RemoteRow>> {
        let rows: Vec<RemoteRow> = self
            .client
            .get_json(table, &[("select", "*".to_string())])
            .await
            .with_context(|| format!("Failed to read rows from {}", table))?;
        debug!(table, count = rows.len(), "Read remote rows");
        Ok(rows)
    }

    async fn upsert_rows(&self, table: &str, rows: &[RemoteRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.client
            .upsert_json(table, "id", rows)
            .await
            .with_context(|| format!("Failed to upsert {} rows into {}", rows.len(), table))?;
        debug!(table, count = rows.len(), "Upserted remote rows");
        Ok(())
    }

    async fn read_documents(&self, table: &str) -> Result<Vec<Value>> {
        let docs: Vec<Value> = self
            .client
            .get_json(table, &[("select", "*".to_string())])
            .await
            .with_context(|| format!("Failed to read documents from {}", table))?;
        debug!(table, count = docs.len(), "Read remote documents");
        Ok(docs)
    }

    async fn read_setting(&self, table: &str, key: &str) -> Result<Option<SettingRow>> {
        let rows: Vec<SettingRow> = self
            .client
            .get_json(
                table,
                &[("select", "*".to_string()), ("key", format!("eq.{}", key))],
            )
            .await
            .with_context(|| format!("Failed to read setting {} from {}", key, table))?;

        if rows.len() > 1 {
            warn!(table, key, count = rows.len(), "Multiple rows for one setting key, using the first");
        }
        Ok(rows.into_iter().next())
    }

    async fn upsert_setting(&self, table: &str, row: &SettingRow) -> Result<()> {
        self.client
            .upsert_json(table, "key", row)
            .await
            .with_context(|| format!("Failed to upsert setting {} into {}", row.key, table))?;
        debug!(table, key = %row.key, "Upserted remote setting");
        Ok(())
    }

    async fn subscribe(&self, tables: &[String], mask: EventMask) -> Result<Subscription> {
        if tables.is_empty() {
            anyhow::bail!("Cannot subscribe to an empty table list");
        }

        let (tx, rx) = mpsc::channel(NOTIFICATION_BUFFER);
        let cancel = CancellationToken::new();
        ChangeFeed::new(self.client.clone(), tables, mask, self.poll_interval)
            .spawn(tx, cancel.clone());

        Ok(Subscription {
            notifications: rx,
            handle: SubscriptionHandle::new(move || cancel.cancel()),
        })
    }
}
