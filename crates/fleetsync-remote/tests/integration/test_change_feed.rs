//! Polling change feed and subscriptions

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use fleetsync_core::domain::{ChangeKind, EventMask};
use fleetsync_core::ports::IRemoteReplica;
use fleetsync_remote::{ChangeFeed, RestClient};

use crate::common::{mount_watermark, setup_remote_mock, TEST_KEY};

fn tables(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_first_poll_is_baseline_only() {
    let (server, _) = setup_remote_mock().await;
    mount_watermark(&server, "vehicle_records", 2, "2024-06-01T00:00:00Z", None).await;

    let client = RestClient::with_base_url(TEST_KEY, server.uri());
    let mut feed = ChangeFeed::new(client, &tables(&["vehicle_records"]), EventMask::All, Duration::from_secs(5));

    assert!(feed.poll_once().await.is_empty());
    assert!(feed.poll_once().await.is_empty());
}

#[tokio::test]
async fn test_detects_insert_update_and_delete() {
    let (server, _) = setup_remote_mock().await;
    let client = RestClient::with_base_url(TEST_KEY, server.uri());
    let mut feed = ChangeFeed::new(client, &tables(&["vehicle_records"]), EventMask::All, Duration::from_secs(5));

    mount_watermark(&server, "vehicle_records", 2, "2024-06-01T00:00:00Z", None).await;
    assert!(feed.poll_once().await.is_empty());

    server.reset().await;
    mount_watermark(&server, "vehicle_records", 3, "2024-06-02T00:00:00Z", None).await;
    let changes = feed.poll_once().await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].table, "vehicle_records");
    assert_eq!(changes[0].kind, ChangeKind::Insert);

    server.reset().await;
    mount_watermark(&server, "vehicle_records", 3, "2024-06-03T00:00:00Z", None).await;
    assert_eq!(feed.poll_once().await[0].kind, ChangeKind::Update);

    server.reset().await;
    mount_watermark(&server, "vehicle_records", 1, "2024-06-03T00:00:00Z", None).await;
    assert_eq!(feed.poll_once().await[0].kind, ChangeKind::Delete);
}

#[tokio::test]
async fn test_mask_filters_kinds() {
    let (server, _) = setup_remote_mock().await;
    let client = RestClient::with_base_url(TEST_KEY, server.uri());
    let mut feed = ChangeFeed::new(client, &tables(&["vehicle_records"]), EventMask::Delete, Duration::from_secs(5));

    mount_watermark(&server, "vehicle_records", 1, "a", None).await;
    feed.poll_once().await;

    server.reset().await;
    mount_watermark(&server, "vehicle_records", 2, "b", None).await;
    assert!(feed.poll_once().await.is_empty());
}

#[tokio::test]
async fn test_failed_poll_keeps_previous_watermark() {
    let (server, _) = setup_remote_mock().await;
    let client = RestClient::with_base_url(TEST_KEY, server.uri());
    let mut feed = ChangeFeed::new(client, &tables(&["vehicle_records"]), EventMask::All, Duration::from_secs(5));

    mount_watermark(&server, "vehicle_records", 1, "a", None).await;
    feed.poll_once().await;

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/vehicle_records"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    assert!(feed.poll_once().await.is_empty());

    server.reset().await;
    mount_watermark(&server, "vehicle_records", 1, "a", None).await;
    assert!(feed.poll_once().await.is_empty());
}

#[tokio::test]
async fn test_table_without_updated_at_falls_back_to_count() {
    let (server, _) = setup_remote_mock().await;
    let client = RestClient::with_base_url(TEST_KEY, server.uri());
    let mut feed = ChangeFeed::new(client, &tables(&["profiles"]), EventMask::All, Duration::from_secs(5));

    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("select", "updated_at"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"code": "42703"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("select", "*"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "0-0/4")
                .set_body_json(json!([{"id": 1}])),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/profiles"))
        .and(query_param("select", "*"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", "0-0/5")
                .set_body_json(json!([{"id": 1}])),
        )
        .mount(&server)
        .await;

    assert!(feed.poll_once().await.is_empty());
    let changes = feed.poll_once().await;
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].kind, ChangeKind::Insert);
}

#[tokio::test]
async fn test_subscription_delivers_until_dropped() {
    let (server, replica) = setup_remote_mock().await;
    mount_watermark(&server, "vehicle_records", 1, "2024-06-01T00:00:00Z", Some(1)).await;
    mount_watermark(&server, "vehicle_records", 2, "2024-06-02T00:00:00Z", None).await;

    let mut subscription = replica
        .subscribe(&tables(&["vehicle_records"]), EventMask::All)
        .await
        .unwrap();

    let notification = tokio::time::timeout(Duration::from_secs(5), subscription.notifications.recv())
        .await
        .expect("notification within timeout")
        .expect("channel open");
    assert_eq!(notification.table, "vehicle_records");
    assert_eq!(notification.kind, ChangeKind::Insert);

    let mut notifications = subscription.notifications;
    subscription.handle.stop();

    let closed = tokio::time::timeout(Duration::from_secs(5), notifications.recv())
        .await
        .expect("feed stops after cancel");
    assert!(closed.is_none());
}

#[tokio::test]
async fn test_subscribe_to_nothing_fails() {
    let (_server, replica) = setup_remote_mock().await;
    assert!(replica.subscribe(&[], EventMask::All).await.is_err());
}
