#![allow(clippy::unwrap_used)]
// Integration tests for `GatewayClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use systemon_api::{Error, GatewayClient, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, GatewayClient) {
    let server = MockServer::start().await;
    let key: SecretString = "test-key".to_string().into();
    let client =
        GatewayClient::new(&server.uri(), Some(&key), &TransportConfig::default()).unwrap();
    (server, client)
}

fn device_path(suffix: &str) -> String {
    if suffix.is_empty() {
        "/api/v1.0/devices/HW-1".into()
    } else {
        format!("/api/v1.0/devices/HW-1/{suffix}")
    }
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_devices_sends_model_filter_and_headers() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1.0/devices"))
        .and(query_param("deviceModels", "MXA310"))
        .and(query_param("deviceModels", "P300"))
        .and(query_param("pageSize", "50"))
        .and(header("Authorization", "test-key"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "hardwareId": "HW-1", "model": "MXA310" },
            { "hardwareId": "HW-2", "model": "P300" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let models = vec!["MXA310".to_string(), "P300".to_string()];
    let devices = client.list_devices(&models, Some(50)).await.unwrap();

    assert_eq!(devices.len(), 2);
    assert_eq!(devices[1]["hardwareId"], "HW-2");
}

#[tokio::test]
async fn test_list_devices_rejects_non_array_body() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1.0/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = client.list_devices(&[], None).await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_get_device_returns_payload() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(device_path("")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hardwareId": "HW-1",
            "model": "MXA910",
            "deviceState": "ONLINE"
        })))
        .mount(&server)
        .await;

    let device = client.get_device("HW-1").await.unwrap();
    assert_eq!(device["model"], "MXA910");
}

// ── Error translation ───────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_maps_to_authentication() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(device_path("")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = client.get_device("HW-1").await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_not_initialized_code_is_recognized() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path(device_path("audio/mute")))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": { "code": "DeviceNotInitialized", "message": "initialize first" }
        })))
        .mount(&server)
        .await;

    let err = client.set_mute("HW-1", true).await.unwrap_err();
    assert!(err.is_device_not_initialized(), "got: {err:?}");
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn test_other_gateway_errors_keep_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(device_path("maintenance/reboot")))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "code": "Busy", "message": "try later" })),
        )
        .mount(&server)
        .await;

    match client.reboot("HW-1").await {
        Err(Error::Gateway {
            status,
            code,
            message,
            body,
        }) => {
            assert_eq!(status, 500);
            assert_eq!(code.as_deref(), Some("Busy"));
            assert_eq!(message, "try later");
            assert!(body.contains("try later"));
        }
        other => panic!("expected Gateway error, got: {other:?}"),
    }
}

// ── Commands ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_set_mute_sends_string_state() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path(device_path("audio/mute")))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({ "muteState": "false" })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client.set_mute("HW-1", false).await.unwrap();
}

#[tokio::test]
async fn test_encryption_toggle_paths() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path(device_path("encryption/audio/enable")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(device_path("encryption/audio/disable")))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.set_encryption("HW-1", true).await.unwrap();
    client.set_encryption("HW-1", false).await.unwrap();
}

#[tokio::test]
async fn test_maintenance_and_setup_commands() {
    let (server, client) = setup().await;

    for (verb, suffix) in [
        ("POST", "initialize"),
        ("PUT", "automixer/bypass"),
        ("POST", "maintenance/defaultsreset"),
    ] {
        Mock::given(method(verb))
            .and(path(device_path(suffix)))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    client.initialize_device("HW-1").await.unwrap();
    client.bypass_automixer("HW-1").await.unwrap();
    client.reset_to_defaults("HW-1").await.unwrap();
}
