// SystemOn gateway HTTP client
//
// Wraps `reqwest::Client` with gateway URL construction, the default
// header set, and translation of non-2xx responses into typed errors.
// Device payloads are returned as raw JSON; turning them into records is
// the mapper's job in systemon-core.

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Path prefix of every gateway endpoint.
pub const API_BASE_PATH: &str = "/api/v1.0";

/// Error code the gateway returns while a device awaits initialization.
pub const DEVICE_NOT_INITIALIZED: &str = "DeviceNotInitialized";

const BODY_PREVIEW_CHARS: usize = 200;

/// Async client for the SystemOn gateway.
///
/// Every request carries `Accept: application/json`; non-GET requests add
/// `Content-Type: application/json`; `Authorization` is sent verbatim when
/// an API key is configured. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a gateway root URL (e.g. `https://10.0.0.5:10000`),
    /// an optional API key, and a transport config.
    pub fn new(
        base_url: &str,
        api_key: Option<&SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key {
            let mut value =
                HeaderValue::from_str(key.expose_secret()).map_err(|e| Error::Authentication {
                    message: format!("invalid API key header value: {e}"),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = transport.build_client_with_headers(headers)?;
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Wrap an existing `reqwest::Client` (caller manages default headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        Ok(Self { http, base_url })
    }

    /// Append `/api/v1.0` unless the caller already included it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        if path.ends_with(API_BASE_PATH) {
            url.set_path(&path);
        } else {
            url.set_path(&format!("{path}{API_BASE_PATH}"));
        }
        Ok(url)
    }

    /// The resolved API base (always ends in `/api/v1.0`).
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builder ──────────────────────────────────────────────────

    /// Append percent-encoded path segments onto the API base.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    // ── Discovery ────────────────────────────────────────────────────

    /// `GET /devices`, one `deviceModels` query parameter per model.
    ///
    /// Model order is preserved. `page_size` is forwarded as `pageSize`
    /// when set.
    pub async fn list_devices(
        &self,
        models: &[String],
        page_size: Option<u32>,
    ) -> Result<Vec<Value>, Error> {
        let mut params: Vec<(&str, String)> = models
            .iter()
            .map(|m| ("deviceModels", m.clone()))
            .collect();
        if let Some(size) = page_size {
            params.push(("pageSize", size.to_string()));
        }

        let url = self.endpoint(&["devices"]);
        debug!("GET {url} params={params:?}");
        let resp = self.http.get(url).query(&params).send().await?;
        Self::handle_response(resp).await
    }

    /// `GET /devices/{hardwareId}`.
    pub async fn get_device(&self, hardware_id: &str) -> Result<Value, Error> {
        let url = self.endpoint(&["devices", hardware_id]);
        debug!("GET {url}");
        let resp = self.http.get(url).send().await?;
        Self::handle_response(resp).await
    }

    // ── Device commands ──────────────────────────────────────────────

    /// `POST /devices/{hardwareId}/initialize`.
    pub async fn initialize_device(&self, hardware_id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["devices", hardware_id, "initialize"]);
        self.send_command(Method::POST, url, None).await
    }

    /// `PUT /devices/{hardwareId}/automixer/bypass`.
    pub async fn bypass_automixer(&self, hardware_id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["devices", hardware_id, "automixer", "bypass"]);
        self.send_command(Method::PUT, url, None).await
    }

    /// `PATCH /devices/{hardwareId}/audio/mute` with `{"muteState": "<bool>"}`.
    pub async fn set_mute(&self, hardware_id: &str, muted: bool) -> Result<(), Error> {
        let url = self.endpoint(&["devices", hardware_id, "audio", "mute"]);
        let body = json!({ "muteState": muted.to_string() });
        self.send_command(Method::PATCH, url, Some(&body)).await
    }

    /// `PATCH /devices/{hardwareId}/encryption/audio/{enable|disable}`.
    pub async fn set_encryption(&self, hardware_id: &str, enabled: bool) -> Result<(), Error> {
        let action = if enabled { "enable" } else { "disable" };
        let url = self.endpoint(&["devices", hardware_id, "encryption", "audio", action]);
        self.send_command(Method::PATCH, url, None).await
    }

    /// `POST /devices/{hardwareId}/maintenance/reboot`.
    pub async fn reboot(&self, hardware_id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["devices", hardware_id, "maintenance", "reboot"]);
        self.send_command(Method::POST, url, None).await
    }

    /// `POST /devices/{hardwareId}/maintenance/defaultsreset`.
    pub async fn reset_to_defaults(&self, hardware_id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["devices", hardware_id, "maintenance", "defaultsreset"]);
        self.send_command(Method::POST, url, None).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send_command(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<(), Error> {
        debug!("{method} {url}");

        let mut builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = builder.send().await?;
        Self::handle_empty(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        if !status.is_success() {
            return Err(Self::parse_error(status, resp).await);
        }

        let body = resp.text().await?;
        trace!(bytes = body.len(), "response body received");
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    async fn handle_empty(resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::parse_error(status, resp).await)
        }
    }

    /// Translate a rejected response into a typed error.
    ///
    /// The body is kept on every gateway error. A structured body whose
    /// `code` is `DeviceNotInitialized` becomes its own variant.
    async fn parse_error(status: StatusCode, resp: reqwest::Response) -> Error {
        if status == StatusCode::UNAUTHORIZED {
            return Error::Authentication {
                message: "gateway rejected the API key (HTTP 401)".into(),
            };
        }

        let body = resp.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<Value>(&body).ok();
        let code = parsed.as_ref().and_then(error_code).map(str::to_owned);
        let message = parsed
            .as_ref()
            .and_then(error_message)
            .map_or_else(
                || {
                    if body.is_empty() {
                        status.to_string()
                    } else {
                        preview(&body)
                    }
                },
                str::to_owned,
            );

        if code.as_deref() == Some(DEVICE_NOT_INITIALIZED) {
            Error::DeviceNotInitialized {
                status: status.as_u16(),
                message,
            }
        } else {
            Error::Gateway {
                status: status.as_u16(),
                code,
                message,
                body,
            }
        }
    }
}

// ── Structured error body lookup ─────────────────────────────────────

/// Find the error `code`: top level first, then one level down
/// (`{"error": {"code": ..}}` or `{"errors": [{"code": ..}]}`).
pub(crate) fn error_code(body: &Value) -> Option<&str> {
    shallow_field(body, "code")
}

fn error_message(body: &Value) -> Option<&str> {
    shallow_field(body, "message")
}

fn shallow_field<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    let obj = body.as_object()?;
    if let Some(value) = obj.get(field).and_then(Value::as_str) {
        return Some(value);
    }
    obj.values().find_map(|child| match child {
        Value::Object(inner) => inner.get(field).and_then(Value::as_str),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.get(field).and_then(Value::as_str)),
        _ => None,
    })
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn error_code_found_at_top_level() {
        let body = json!({ "code": "DeviceNotInitialized", "message": "x" });
        assert_eq!(error_code(&body), Some("DeviceNotInitialized"));
    }

    #[test]
    fn error_code_found_one_level_deep() {
        let nested = json!({ "error": { "code": "DeviceNotInitialized" } });
        assert_eq!(error_code(&nested), Some("DeviceNotInitialized"));

        let listed = json!({ "errors": [{ "code": "Busy" }] });
        assert_eq!(error_code(&listed), Some("Busy"));
    }

    #[test]
    fn error_code_ignores_deeper_nesting() {
        let body = json!({ "outer": { "inner": { "code": "DeviceNotInitialized" } } });
        assert_eq!(error_code(&body), None);
    }

    #[test]
    fn base_url_gets_api_prefix_once() {
        let a = GatewayClient::normalize_base_url("https://10.0.0.5:10000").unwrap();
        assert_eq!(a.as_str(), "https://10.0.0.5:10000/api/v1.0");

        let b = GatewayClient::normalize_base_url("https://10.0.0.5:10000/api/v1.0/").unwrap();
        assert_eq!(b.as_str(), "https://10.0.0.5:10000/api/v1.0");
    }

    #[test]
    fn endpoint_encodes_hardware_ids() {
        let client =
            GatewayClient::from_reqwest("http://localhost:1234", reqwest::Client::new()).unwrap();
        let url = client.endpoint(&["devices", "ab cd", "initialize"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:1234/api/v1.0/devices/ab%20cd/initialize"
        );
    }
}
