// ── Device domain types ──
//
// One cached record per gateway device. Records are built by the mapper,
// owned by the fleet cache, and only patched by the poller (online flag)
// and the control dispatcher (controllable values).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a controllable property is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ControlKind {
    /// Two-state switch; the cached value tracks the last applied state.
    Toggle,
    /// Fire-and-forget action with no persistent value.
    Push,
}

/// A property the consumer may write through `apply_control`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllableProperty {
    pub name: String,
    pub kind: ControlKind,
    pub value: Option<String>,
}

/// Snapshot of one device as last seen through the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    /// Gateway hardware id.
    pub id: String,
    pub model: String,
    pub name: Option<String>,
    pub serial_number: Option<String>,
    pub online: bool,
    pub properties: BTreeMap<String, String>,
    pub statistics: BTreeMap<String, String>,
    pub controllable_properties: Vec<ControllableProperty>,
    pub last_updated: DateTime<Utc>,
}

impl DeviceRecord {
    pub fn control(&self, name: &str) -> Option<&ControllableProperty> {
        self.controllable_properties.iter().find(|c| c.name == name)
    }

    /// Display label: the device name when known, else the hardware id.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn control_kind_parses_case_insensitively() {
        assert_eq!(ControlKind::from_str("Toggle").ok(), Some(ControlKind::Toggle));
        assert_eq!(ControlKind::from_str("push").ok(), Some(ControlKind::Push));
        assert!(ControlKind::from_str("slider").is_err());
    }

    #[test]
    fn label_falls_back_to_id() {
        let record = DeviceRecord {
            id: "HW-1".into(),
            model: "P300".into(),
            name: None,
            serial_number: None,
            online: true,
            properties: BTreeMap::new(),
            statistics: BTreeMap::new(),
            controllable_properties: Vec::new(),
            last_updated: Utc::now(),
        };
        assert_eq!(record.label(), "HW-1");
    }
}
