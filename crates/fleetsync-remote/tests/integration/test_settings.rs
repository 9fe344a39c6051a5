//! Settings table single-key reads and upserts

use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use fleetsync_core::domain::{SettingRow, Timestamp};
use fleetsync_core::ports::IRemoteReplica;

use crate::common::setup_remote_mock;

#[tokio::test]
async fn test_read_setting_filters_by_key() {
    let (server, replica) = setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vehicle_settings"))
        .and(query_param("key", "eq.vehicle_statuses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"key": "vehicle_statuses", "value": {"34 ABC 01": "active"}, "updated_at": "2024-06-01T08:00:00+00:00"}
        ])))
        .mount(&server)
        .await;

    let row = replica
        .read_setting("vehicle_settings", "vehicle_statuses")
        .await
        .unwrap()
        .expect("row present");
    assert_eq!(row.key, "vehicle_statuses");
    assert_eq!(row.value, json!({"34 ABC 01": "active"}));
    assert_eq!(
        row.updated_at(),
        Timestamp::parse("2024-06-01T08:00:00Z").unwrap()
    );
}

#[tokio::test]
async fn test_missing_setting_is_none() {
    let (server, replica) = setup_remote_mock().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/vehicle_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let row = replica
        .read_setting("vehicle_settings", "vehicle_photos")
        .await
        .unwrap();
    assert!(row.is_none());
}

#[tokio::test]
async fn test_upsert_setting_posts_single_object() {
    let (server, replica) = setup_remote_mock().await;
    let stamp = Timestamp::parse("2024-06-03T12:00:00Z").unwrap();

    Mock::given(method("POST"))
        .and(path("/rest/v1/vehicle_settings"))
        .and(query_param("on_conflict", "key"))
        .and(body_json(json!({
            "key": "deleted_vehicle_records",
            "value": [{"__backendId": "r9"}],
            "updated_at": "2024-06-03T12:00:00.000Z"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let row = SettingRow::new("deleted_vehicle_records", json!([{"__backendId": "r9"}]), stamp);
    replica
        .upsert_setting("vehicle_settings", &row)
        .await
        .unwrap();
}
