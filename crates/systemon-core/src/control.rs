// ── Control dispatch ──
//
// Executes a named control against one device. A device that answers
// `DeviceNotInitialized` gets exactly one initialize call and one retry.
// Successful toggles are written back to the cache immediately so the next
// retrieve reflects them before the poller catches up.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use systemon_api::GatewayClient;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::store::FleetCache;

/// Controls the gateway knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
pub enum ControlCommand {
    /// Toggle: `PATCH audio/mute`.
    Mute,
    /// Toggle: `PATCH encryption/audio/{enable,disable}`.
    #[strum(to_string = "DanteEncryption", serialize = "Encryption")]
    DanteEncryption,
    /// Push: `POST maintenance/reboot`.
    Reboot,
    /// Push: `POST maintenance/defaultsreset`.
    Reset,
    /// Push: `PUT automixer/bypass`.
    BypassAllEq,
}

impl ControlCommand {
    /// Whether the command carries a boolean state.
    pub fn is_toggle(self) -> bool {
        matches!(self, Self::Mute | Self::DanteEncryption)
    }
}

/// One entry of a control batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlRequest {
    pub device_id: String,
    pub property: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl ControlRequest {
    pub fn new(device_id: impl Into<String>, property: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            device_id: device_id.into(),
            property: property.into(),
            value: value.map(str::to_owned),
        }
    }
}

/// How a control request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum ControlOutcome {
    /// Accepted on the first attempt.
    Applied,
    /// Accepted after initializing the device.
    Reinitialized,
    /// Unknown control name; nothing was sent.
    Ignored,
}

/// Parse a boolean-like control value.
pub fn parse_bool(raw: &str) -> Result<bool, CoreError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(CoreError::ValidationFailed {
            message: format!("expected a boolean value (1/0, true/false, on/off, yes/no), got {other:?}"),
        }),
    }
}

pub(crate) struct ControlDispatcher {
    client: GatewayClient,
    cache: Arc<FleetCache>,
}

impl ControlDispatcher {
    pub(crate) fn new(client: GatewayClient, cache: Arc<FleetCache>) -> Self {
        Self { client, cache }
    }

    /// Apply one control. Unknown names are a no-op.
    pub(crate) async fn apply(
        &self,
        device_id: &str,
        property: &str,
        value: Option<&str>,
    ) -> Result<ControlOutcome, CoreError> {
        let Ok(command) = ControlCommand::from_str(property) else {
            debug!(hardware_id = %device_id, property, "unknown control, ignoring");
            return Ok(ControlOutcome::Ignored);
        };

        let state = if command.is_toggle() {
            let raw = value.ok_or_else(|| CoreError::ValidationFailed {
                message: format!("{command} requires a value"),
            })?;
            Some(parse_bool(raw)?)
        } else {
            None
        };

        let outcome = match self.send(command, device_id, state).await {
            Ok(()) => ControlOutcome::Applied,
            Err(e) if e.is_device_not_initialized() => {
                info!(hardware_id = %device_id, %command, "device not initialized, initializing and retrying");
                self.client
                    .initialize_device(device_id)
                    .await
                    .map_err(|e| device_error(e, device_id))?;
                self.send(command, device_id, state)
                    .await
                    .map_err(|e| device_error(e, device_id))?;
                ControlOutcome::Reinitialized
            }
            Err(e) => {
                warn!(hardware_id = %device_id, %command, error = %e, "control failed");
                return Err(device_error(e, device_id));
            }
        };

        // Cached toggles use the mapper's `true`/`false` spelling.
        if let Some(state) = state {
            self.cache
                .patch_controllable_value(device_id, &command.to_string(), &state.to_string());
        }
        info!(hardware_id = %device_id, %command, %outcome, "control applied");
        Ok(outcome)
    }

    /// Apply controls in order, stopping at the first failure.
    pub(crate) async fn apply_batch(
        &self,
        requests: &[ControlRequest],
    ) -> Result<Vec<ControlOutcome>, CoreError> {
        if requests.is_empty() {
            return Err(CoreError::InvalidArgument {
                message: "control batch cannot be empty".into(),
            });
        }

        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            outcomes.push(
                self.apply(&request.device_id, &request.property, request.value.as_deref())
                    .await?,
            );
        }
        Ok(outcomes)
    }

    async fn send(
        &self,
        command: ControlCommand,
        device_id: &str,
        state: Option<bool>,
    ) -> Result<(), systemon_api::Error> {
        let state = state.unwrap_or_default();
        match command {
            ControlCommand::Mute => self.client.set_mute(device_id, state).await,
            ControlCommand::DanteEncryption => self.client.set_encryption(device_id, state).await,
            ControlCommand::Reboot => self.client.reboot(device_id).await,
            ControlCommand::Reset => self.client.reset_to_defaults(device_id).await,
            ControlCommand::BypassAllEq => self.client.bypass_automixer(device_id).await,
        }
    }
}

/// Attach the device id to errors that carry one.
fn device_error(err: systemon_api::Error, device_id: &str) -> CoreError {
    match CoreError::from(err) {
        CoreError::DeviceNotInitialized { message, .. } => CoreError::DeviceNotInitialized {
            hardware_id: device_id.to_owned(),
            message,
        },
        CoreError::DeviceNotFound { .. } => CoreError::DeviceNotFound {
            identifier: device_id.to_owned(),
        },
        other => other,
    }
}
