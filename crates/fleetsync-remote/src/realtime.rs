//! Polling change feed
//!
//! The backend is watched by polling a cheap watermark per table: the row
//! count (from `Content-Range` with `Prefer: count=exact`) and the newest
//! `updated_at`. A changed watermark becomes one [`ChangeNotification`].
//! The first successful poll of a table only establishes its baseline.
//!
//! Delivery is at-least-once and lossy under backpressure: notifications
//! are sent with `try_send`, and a full channel drops them. Any delivered
//! notification means "resync eventually", so nothing is lost by dropping
//! duplicates.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleetsync_core::domain::{ChangeKind, ChangeNotification, EventMask, Timestamp};

use crate::client::{decode, RestClient};
use crate::RemoteError;

/// Column every watched table is expected to carry
const UPDATED_AT_COLUMN: &str = "updated_at";

/// Observable state of one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    /// Total row count, when the server reported one
    pub count: Option<u64>,
    /// `updated_at` of the most recently updated row
    pub newest: Option<String>,
}

impl Watermark {
    /// Classifies the difference between two observations
    pub fn classify(&self, next: &Watermark) -> Option<ChangeKind> {
        match (self.count, next.count) {
            (Some(before), Some(after)) if after > before => Some(ChangeKind::Insert),
            (Some(before), Some(after)) if after < before => Some(ChangeKind::Delete),
            _ if self.newest != next.newest => Some(ChangeKind::Update),
            _ => None,
        }
    }
}

/// Polls remote tables and turns watermark changes into notifications
pub struct ChangeFeed {
    client: RestClient,
    tables: Vec<String>,
    mask: EventMask,
    interval: Duration,
    marks: HashMap<String, Watermark>,
    /// Tables without an orderable `updated_at`; watched by count only
    count_only: HashSet<String>,
}

impl ChangeFeed {
    /// Creates a feed over `tables`
    pub fn new(client: RestClient, tables: &[String], mask: EventMask, interval: Duration) -> Self {
        Self {
            client,
            tables: tables.to_vec(),
            mask,
            interval,
            marks: HashMap::new(),
            count_only: HashSet::new(),
        }
    }

    /// Reads the current watermark of one table
    pub async fn watermark(&mut self, table: &str) -> Result<Watermark, RemoteError> {
        if !self.count_only.contains(table) {
            match self.fetch(table, true).await {
                Err(RemoteError::InvalidResponse(reason)) => {
                    warn!(table, %reason, "Table cannot be ordered by updated_at, watching row count only");
                    self.count_only.insert(table.to_string());
                }
                other => return other,
            }
        }
        self.fetch(table, false).await
    }

    async fn fetch(&self, table: &str, ordered: bool) -> Result<Watermark, RemoteError> {
        let query: Vec<(&str, String)> = if ordered {
            vec![
                ("select", UPDATED_AT_COLUMN.to_string()),
                ("order", format!("{}.desc.nullslast", UPDATED_AT_COLUMN)),
                ("limit", "1".to_string()),
            ]
        } else {
            vec![("select", "*".to_string()), ("limit", "1".to_string())]
        };

        let response = self
            .client
            .send(
                self.client
                    .request(Method::GET, table)
                    .query(&query)
                    .header("Prefer", "count=exact"),
            )
            .await?;

        let count = response
            .headers()
            .get(reqwest::header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total);

        let rows: Vec<Value> = decode(response).await?;
        let newest = if ordered {
            rows.first()
                .and_then(|row| row.get(UPDATED_AT_COLUMN))
                .and_then(Value::as_str)
                .map(str::to_string)
        } else {
            None
        };

        Ok(Watermark { count, newest })
    }

    /// Polls every table once and returns the notifications the mask accepts
    pub async fn poll_once(&mut self) -> Vec<ChangeNotification> {
        let mut notifications = Vec::new();

        for table in self.tables.clone() {
            let mark = match self.watermark(&table).await {
                Ok(mark) => mark,
                Err(e) => {
                    debug!(table = %table, error = %e, "Change feed poll failed");
                    continue;
                }
            };

            let Some(previous) = self.marks.insert(table.clone(), mark.clone()) else {
                debug!(table = %table, ?mark, "Change feed baseline");
                continue;
            };

            if let Some(kind) = previous.classify(&mark) {
                if self.mask.accepts(kind) {
                    debug!(table = %table, ?kind, "Remote change detected");
                    notifications.push(ChangeNotification {
                        table,
                        kind,
                        detected_at: Timestamp::now(),
                    });
                }
            }
        }

        notifications
    }

    /// Runs the feed until `cancel` fires or the receiver is dropped
    pub fn spawn(
        mut self,
        sender: mpsc::Sender<ChangeNotification>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(tables = ?self.tables, interval = ?self.interval, "Change feed started");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        for notification in self.poll_once().await {
                            match sender.try_send(notification) {
                                Ok(()) => {}
                                Err(TrySendError::Full(dropped)) => {
                                    debug!(table = %dropped.table, "Notification channel full, dropping");
                                }
                                Err(TrySendError::Closed(_)) => {
                                    info!("Change feed receiver dropped");
                                    return;
                                }
                            }
                        }
                    }
                }
            }

            info!("Change feed stopped");
        })
    }
}

/// Extracts the total from `Content-Range: 0-0/42` or `*/0`
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}
