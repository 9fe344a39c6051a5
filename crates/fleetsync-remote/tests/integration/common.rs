//! Shared test helpers for remote replica integration tests
//!
//! Provides wiremock-based mock server setup for the REST endpoints. Each
//! helper mounts the necessary mock endpoints on the given server.

use std::time::Duration;

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fleetsync_remote::{RestClient, RestRemoteReplica};

/// Key every helper client sends
pub const TEST_KEY: &str = "test-anon-key";

/// Starts a mock server and returns a replica pointing at it
pub async fn setup_remote_mock() -> (MockServer, RestRemoteReplica) {
    let server = MockServer::start().await;
    let replica = RestRemoteReplica::new(
        RestClient::with_base_url(TEST_KEY, server.uri()),
        Duration::from_millis(50),
    );
    (server, replica)
}

/// Mounts `GET /rest/v1/<table>?select=*` returning `body`
pub async fn mount_table(server: &MockServer, table: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("select", "*"))
        .and(header("apikey", TEST_KEY))
        .and(header("Authorization", format!("Bearer {}", TEST_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts an upsert endpoint for `table` accepting any body
pub async fn mount_upsert(server: &MockServer, table: &str, on_conflict: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("on_conflict", on_conflict))
        .respond_with(ResponseTemplate::new(201))
        .mount(server)
        .await;
}

/// Mounts a watermark response for `table` with a row count and newest stamp
pub async fn mount_watermark(
    server: &MockServer,
    table: &str,
    count: u64,
    newest: &str,
    times: Option<u64>,
) {
    let range = if count == 0 {
        "*/0".to_string()
    } else {
        format!("0-0/{}", count)
    };
    let mock = Mock::given(method("GET"))
        .and(path(format!("/rest/v1/{}", table)))
        .and(query_param("select", "updated_at"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Range", range.as_str())
                .set_body_json(serde_json::json!([{ "updated_at": newest }])),
        );
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}
