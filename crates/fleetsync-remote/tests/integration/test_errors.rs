//! HTTP failure mapping

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use fleetsync_core::ports::IRemoteReplica;
use fleetsync_remote::{RemoteError, RestClient, RestRemoteReplica};

use crate::common::setup_remote_mock;

async fn failing_read(status: u16) -> anyhow::Error {
    let (server, replica) = setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/vehicle_records"))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({"message": "nope"})))
        .mount(&server)
        .await;
    replica.read_rows("vehicle_records").await.unwrap_err()
}

#[tokio::test]
async fn test_unauthorized_key() {
    let err = failing_read(401).await;
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::Unauthorized(_))
    ));
    assert!(err.to_string().contains("vehicle_records"));
}

#[tokio::test]
async fn test_server_error() {
    let err = failing_read(503).await;
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::ServerError(_))
    ));
}

#[tokio::test]
async fn test_rate_limited_with_retry_after() {
    let (server, replica) = setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/vehicle_records"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "9"))
        .mount(&server)
        .await;

    let err = replica.read_rows("vehicle_records").await.unwrap_err();
    match err.downcast_ref::<RemoteError>() {
        Some(RemoteError::TooManyRequests { retry_after }) => {
            assert_eq!(retry_after.as_secs(), 9)
        }
        other => panic!("expected TooManyRequests, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let (server, replica) = setup_remote_mock().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/vehicle_records"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = replica.read_rows("vehicle_records").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::InvalidResponse(_))
    ));
}

#[tokio::test]
async fn test_failed_upsert_surfaces_conflict() {
    let (server, replica) = setup_remote_mock().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/vehicle_records"))
        .respond_with(ResponseTemplate::new(409))
        .mount(&server)
        .await;

    let rows = vec![fleetsync_core::domain::RemoteRow {
        id: "r1".into(),
        data: json!({}),
        updated_at: None,
    }];
    let err = replica.upsert_rows("vehicle_records", &rows).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RemoteError>(),
        Some(RemoteError::Conflict(_))
    ));
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let replica = RestRemoteReplica::new(
        RestClient::with_base_url("k", "http://127.0.0.1:1"),
        std::time::Duration::from_secs(5),
    );
    let err = replica.read_rows("vehicle_records").await.unwrap_err();
    let remote = err.downcast_ref::<RemoteError>().expect("remote error");
    assert!(remote.is_network());
}
