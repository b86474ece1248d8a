// Shared wiremock fixtures for aggregator integration tests.
#![allow(clippy::unwrap_used, dead_code)]

use std::time::Duration;

use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use systemon_core::{Aggregator, AggregatorConfig};

pub const LISTING_PATH: &str = "/api/v1.0/devices";

pub fn device_path(id: &str) -> String {
    format!("{LISTING_PATH}/{id}")
}

/// A detail/listing payload for an online device.
pub fn device(id: &str, model: &str) -> Value {
    json!({
        "hardwareId": id,
        "model": model,
        "deviceName": format!("device {id}"),
        "deviceState": "ONLINE",
        "audioMute": "false",
        "firmwareVersion": "4.5.1"
    })
}

/// Fast pacing so scheduler tests finish in well under a second.
pub fn config(server: &MockServer) -> AggregatorConfig {
    let mut config = AggregatorConfig::new(Url::parse(&server.uri()).unwrap());
    config.timeout = Duration::from_secs(5);
    config.tick = Duration::from_millis(10);
    config.cycle_delay = Duration::from_millis(20);
    config
}

pub fn aggregator(config: AggregatorConfig) -> Aggregator {
    Aggregator::new(config).unwrap()
}

pub async fn mount_listing(server: &MockServer, devices: Vec<Value>, times: Option<u64>) {
    let mock = Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(devices)));
    match times {
        Some(n) => mock.up_to_n_times(n).mount(server).await,
        None => mock.mount(server).await,
    }
}

pub async fn mount_detail(server: &MockServer, id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(device_path(id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn requests(server: &MockServer) -> Vec<Request> {
    server.received_requests().await.unwrap_or_default()
}

/// `METHOD /path` for every request that is not a GET.
pub async fn commands(server: &MockServer) -> Vec<String> {
    requests(server)
        .await
        .into_iter()
        .filter(|r| r.method.as_str() != "GET")
        .map(|r| format!("{} {}", r.method.as_str(), r.url.path()))
        .collect()
}

pub async fn listing_calls(server: &MockServer) -> usize {
    requests(server)
        .await
        .iter()
        .filter(|r| r.url.path() == LISTING_PATH)
        .count()
}

pub fn not_initialized() -> ResponseTemplate {
    ResponseTemplate::new(409).set_body_json(json!({
        "error": { "code": "DeviceNotInitialized", "message": "Device must be initialized" }
    }))
}
