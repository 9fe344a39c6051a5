//! Collection table reads and batched upserts

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use fleetsync_core::domain::RemoteRow;
use fleetsync_core::ports::IRemoteReplica;

use crate::common::{mount_table, mount_upsert, setup_remote_mock, TEST_KEY};

#[tokio::test]
async fn test_read_rows_parses_envelopes() {
    let (server, replica) = setup_remote_mock().await;
    mount_table(
        &server,
        "vehicle_records",
        json!([
            {"id": "r1", "data": {"plate": "34 ABC 01"}, "updated_at": "2024-06-01T00:00:00Z"},
            {"id": "r2", "data": null},
            {"id": "r3"}
        ]),
    )
    .await;

    let rows = replica.read_rows("vehicle_records").await.unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].id, "r1");
    assert_eq!(rows[0].updated_at.as_deref(), Some("2024-06-01T00:00:00Z"));
    assert_eq!(rows[1].updated_at, None);

    let entity = rows[2].clone().into_entity();
    assert_eq!(entity.backend_id(), Some("r3"));
}

#[tokio::test]
async fn test_read_rows_empty_table() {
    let (server, replica) = setup_remote_mock().await;
    mount_table(&server, "vehicle_records", json!([])).await;
    assert!(replica.read_rows("vehicle_records").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upsert_rows_sends_one_batched_request() {
    let (server, replica) = setup_remote_mock().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/vehicle_records"))
        .and(query_param("on_conflict", "id"))
        .and(header("apikey", TEST_KEY))
        .and(body_json(json!([
            {"id": "r1", "data": {"__backendId": "r1", "plate": "A"}, "updated_at": "2024-06-01T00:00:00.000Z"},
            {"id": "r2", "data": {"__backendId": "r2"}, "updated_at": "2024-06-02T00:00:00.000Z"}
        ])))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let rows = vec![
        RemoteRow {
            id: "r1".into(),
            data: json!({"__backendId": "r1", "plate": "A"}),
            updated_at: Some("2024-06-01T00:00:00.000Z".into()),
        },
        RemoteRow {
            id: "r2".into(),
            data: json!({"__backendId": "r2"}),
            updated_at: Some("2024-06-02T00:00:00.000Z".into()),
        },
    ];
    replica.upsert_rows("vehicle_records", &rows).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let prefer = requests[0]
        .headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(prefer, "resolution=merge-duplicates,return=minimal");
}

#[tokio::test]
async fn test_upsert_of_nothing_makes_no_request() {
    let (server, replica) = setup_remote_mock().await;
    mount_upsert(&server, "vehicle_records", "id").await;

    replica.upsert_rows("vehicle_records", &[]).await.unwrap();

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_documents_returns_opaque_rows() {
    let (server, replica) = setup_remote_mock().await;
    mount_table(
        &server,
        "profiles",
        json!([{"id": 7, "name": "Ayşe", "role": "admin"}]),
    )
    .await;

    let docs = replica.read_documents("profiles").await.unwrap();
    assert_eq!(docs, vec![json!({"id": 7, "name": "Ayşe", "role": "admin"})]);
}
