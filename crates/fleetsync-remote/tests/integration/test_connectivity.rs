//! Reachability probes

use fleetsync_core::ports::IConnectivity;
use fleetsync_remote::{NetworkMonitor, RestClient};

use crate::common::{setup_remote_mock, TEST_KEY};

#[tokio::test]
async fn test_any_http_answer_counts_as_online() {
    let (server, _) = setup_remote_mock().await;
    let client = RestClient::with_base_url(TEST_KEY, server.uri());
    let monitor = NetworkMonitor::new();
    monitor.set_online(false);

    // No mock mounted: the server answers 404
    assert!(monitor.probe_once(&client).await);
    assert!(monitor.is_online());
}

#[tokio::test]
async fn test_refused_connection_goes_offline() {
    let client = RestClient::with_base_url(TEST_KEY, "http://127.0.0.1:1");
    let monitor = NetworkMonitor::new();

    assert!(!monitor.probe_once(&client).await);
    assert!(!monitor.is_online());
}
