//! Backend reachability monitor
//!
//! [`NetworkMonitor`] backs the `IConnectivity` port. It starts optimistic
//! (online) and is corrected by periodic probes against the REST root. Any
//! HTTP answer, including an error status, means the backend is reachable;
//! only transport failures (DNS, refused, timeout) flip it offline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use fleetsync_core::ports::IConnectivity;

use crate::client::RestClient;

/// Shared online flag updated by probes
#[derive(Debug, Clone)]
pub struct NetworkMonitor {
    online: Arc<AtomicBool>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    pub fn new() -> Self {
        Self {
            online: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Sets the flag; returns true if the value changed
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.online.swap(online, Ordering::SeqCst);
        if previous != online {
            info!(online, "Connectivity changed");
        }
        previous != online
    }

    /// Probes the backend once and records the result
    pub async fn probe_once(&self, client: &RestClient) -> bool {
        let reachable = match client.probe().send().await {
            Ok(response) => {
                debug!(status = %response.status(), "Connectivity probe answered");
                true
            }
            Err(e) => {
                debug!(error = %e, "Connectivity probe failed");
                false
            }
        };
        self.set_online(reachable);
        reachable
    }

    /// Probes every `interval` until `cancel` fires
    pub fn spawn(
        &self,
        client: RestClient,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        monitor.probe_once(&client).await;
                    }
                }
            }

            debug!("Connectivity monitor stopped");
        })
    }
}

impl IConnectivity for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}
