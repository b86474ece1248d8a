// ── Per-model payload mapping ──
//
// A TOML table describes, per device model, which payload paths feed the
// record fields, properties, statistics and controls. Every model inherits
// the mandatory `generic` section; unknown models use `generic` alone.

pub mod extract;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::model::{ControlKind, ControllableProperty, DeviceRecord};

/// Name of the mandatory fallback model section.
pub const GENERIC_MODEL: &str = "generic";

const BUILTIN_MAPPING: &str = include_str!("../../mappings/models.toml");

// ── File format ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingFile {
    #[serde(default)]
    models: BTreeMap<String, ModelSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelSection {
    #[serde(default)]
    device: DeviceSection,
    #[serde(default)]
    predefined: BTreeMap<String, String>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    statistics: BTreeMap<String, String>,
    #[serde(default)]
    controls: BTreeMap<String, ControlKind>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeviceSection {
    id: Option<String>,
    model: Option<String>,
    name: Option<String>,
    serial_number: Option<String>,
    online: Option<String>,
}

// ── Resolved mapping ─────────────────────────────────────────────────

/// A model section merged over `generic`.
#[derive(Debug, Clone)]
pub struct ModelMapping {
    id_path: String,
    model_path: String,
    name_path: Option<String>,
    serial_path: Option<String>,
    online_path: Option<String>,
    predefined: BTreeMap<String, String>,
    properties: BTreeMap<String, String>,
    statistics: BTreeMap<String, String>,
    controls: BTreeMap<String, ControlKind>,
}

impl ModelMapping {
    fn resolve(section: &ModelSection, generic: &ModelSection) -> Self {
        let pick = |own: &Option<String>, base: &Option<String>| own.clone().or_else(|| base.clone());
        let merged = |own: &BTreeMap<String, String>, base: &BTreeMap<String, String>| {
            let mut out = base.clone();
            out.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
            out
        };

        let mut controls = generic.controls.clone();
        controls.extend(section.controls.iter().map(|(k, v)| (k.clone(), *v)));

        Self {
            id_path: pick(&section.device.id, &generic.device.id)
                .unwrap_or_else(|| "hardwareId".into()),
            model_path: pick(&section.device.model, &generic.device.model)
                .unwrap_or_else(|| "model".into()),
            name_path: pick(&section.device.name, &generic.device.name),
            serial_path: pick(&section.device.serial_number, &generic.device.serial_number),
            online_path: pick(&section.device.online, &generic.device.online),
            predefined: merged(&section.predefined, &generic.predefined),
            properties: merged(&section.properties, &generic.properties),
            statistics: merged(&section.statistics, &generic.statistics),
            controls,
        }
    }

    pub fn control_kind(&self, name: &str) -> Option<ControlKind> {
        self.controls.get(name).copied()
    }
}

/// All model mappings, keyed by model name.
#[derive(Debug, Clone)]
pub struct MappingTable {
    generic: ModelMapping,
    models: HashMap<String, ModelMapping>,
}

impl MappingTable {
    /// The table compiled into the crate.
    pub fn builtin() -> Result<Self, CoreError> {
        Self::from_toml_str(BUILTIN_MAPPING)
    }

    /// Load a mapping file from disk.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| CoreError::Config {
            message: format!("cannot read mapping file {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse a mapping table. A missing `generic` section is fatal.
    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        let file: MappingFile = toml::from_str(raw).map_err(|e| CoreError::Config {
            message: format!("invalid mapping table: {e}"),
        })?;

        let generic_section = file
            .models
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(GENERIC_MODEL))
            .map(|(_, section)| section)
            .ok_or_else(|| CoreError::Config {
                message: format!("mapping table has no `{GENERIC_MODEL}` model"),
            })?;

        let generic = ModelMapping::resolve(generic_section, &ModelSection::default());
        let models = file
            .models
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case(GENERIC_MODEL))
            .map(|(name, section)| (name.clone(), ModelMapping::resolve(section, generic_section)))
            .collect();

        Ok(Self { generic, models })
    }

    /// Mapping for `model`: exact name, then case-insensitive, else generic.
    pub fn for_model(&self, model: &str) -> &ModelMapping {
        self.models
            .get(model)
            .or_else(|| {
                self.models
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(model))
                    .map(|(_, mapping)| mapping)
            })
            .unwrap_or(&self.generic)
    }

    /// Models with their own section (excluding `generic`), sorted.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ── Mapper ───────────────────────────────────────────────────────────

/// Turns raw gateway payloads into [`DeviceRecord`]s.
#[derive(Debug, Clone)]
pub struct DeviceMapper {
    table: MappingTable,
}

impl DeviceMapper {
    pub fn new(table: MappingTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    /// Map one payload. `known_id` is the id the payload was fetched
    /// under, used when the payload itself does not carry one.
    ///
    /// Fails with [`CoreError::DeviceRetrieval`] when the model or the
    /// hardware id cannot be determined.
    pub fn map(&self, payload: &Value, known_id: Option<&str>) -> Result<DeviceRecord, CoreError> {
        let generic = &self.table.generic;

        let id = extract::lookup(payload, &generic.id_path)
            .and_then(extract::value_to_string)
            .or_else(|| known_id.map(str::to_owned))
            .ok_or_else(|| CoreError::DeviceRetrieval {
                hardware_id: "unknown".into(),
                message: format!("payload has no `{}`", generic.id_path),
            })?;

        let model = extract::lookup(payload, &generic.model_path)
            .and_then(extract::value_to_string)
            .ok_or_else(|| CoreError::DeviceRetrieval {
                hardware_id: id.clone(),
                message: "Unable to retrieve device model".into(),
            })?;

        let mapping = self.table.for_model(&model);
        let field = |path: &Option<String>| {
            path.as_deref()
                .and_then(|p| extract::find_path(payload, p))
        };

        let online = field(&mapping.online_path).is_none_or(|state| is_online(&state));

        let mut properties: BTreeMap<String, String> = mapping.predefined.clone();
        for (name, path) in &mapping.properties {
            if let Some(value) = extract::find_path(payload, path) {
                properties.insert(name.clone(), value);
            }
        }
        let statistics = mapping
            .statistics
            .iter()
            .filter_map(|(name, path)| {
                extract::find_path(payload, path).map(|value| (name.clone(), value))
            })
            .collect();

        let controllable_properties = mapping
            .controls
            .iter()
            .map(|(name, kind)| ControllableProperty {
                name: name.clone(),
                kind: *kind,
                value: match kind {
                    ControlKind::Toggle => properties.get(name).cloned(),
                    ControlKind::Push => None,
                },
            })
            .collect();

        debug!(hardware_id = %id, model = %model, "mapped device payload");

        Ok(DeviceRecord {
            name: field(&mapping.name_path),
            serial_number: field(&mapping.serial_path),
            id,
            model,
            online,
            properties,
            statistics,
            controllable_properties,
            last_updated: Utc::now(),
        })
    }
}

/// Gateway device states that count as reachable.
fn is_online(state: &str) -> bool {
    matches!(
        state.trim().to_ascii_lowercase().as_str(),
        "online" | "true" | "1" | "connected" | "on"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn mapper() -> DeviceMapper {
        DeviceMapper::new(MappingTable::builtin().unwrap())
    }

    #[test]
    fn builtin_table_parses() {
        let table = MappingTable::builtin().unwrap();
        assert!(table.model_names().contains(&"MXA310"));
        assert!(!table.model_names().contains(&"generic"));
    }

    #[test]
    fn missing_generic_is_a_config_error() {
        let raw = r#"
            [models.MXA310.properties]
            Mute = "audioMute"
        "#;
        let err = MappingTable::from_toml_str(raw).unwrap_err();
        assert!(matches!(err, CoreError::Config { .. }), "got: {err:?}");
    }

    #[test]
    fn models_inherit_generic_sections() {
        let record = mapper()
            .map(
                &json!({
                    "hardwareId": "HW-1",
                    "model": "MXA310",
                    "deviceName": "Ceiling Mic",
                    "firmwareVersion": "4.5.1",
                    "audioMute": "false",
                    "deviceState": "ONLINE"
                }),
                None,
            )
            .unwrap();

        assert_eq!(record.id, "HW-1");
        assert_eq!(record.name.as_deref(), Some("Ceiling Mic"));
        assert!(record.online);
        assert_eq!(record.properties["FirmwareVersion"], "4.5.1");
        assert_eq!(record.properties["DeviceMake"], "Shure");
        assert_eq!(record.properties["DeviceType"], "Microphone");

        let mute = record.control("Mute").unwrap();
        assert_eq!(mute.kind, ControlKind::Toggle);
        assert_eq!(mute.value.as_deref(), Some("false"));
        assert_eq!(record.control("Reboot").unwrap().value, None);
    }

    #[test]
    fn unknown_models_use_generic() {
        let record = mapper()
            .map(&json!({ "hardwareId": "HW-9", "model": "SLXD4" }), None)
            .unwrap();
        assert_eq!(record.model, "SLXD4");
        assert!(record.control("Mute").is_none());
        assert!(record.control("Reset").is_some());
    }

    #[test]
    fn missing_model_is_a_retrieval_error() {
        let err = mapper()
            .map(&json!({ "hardwareId": "HW-2" }), Some("HW-2"))
            .unwrap_err();
        match err {
            CoreError::DeviceRetrieval { hardware_id, .. } => assert_eq!(hardware_id, "HW-2"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn known_id_fills_in_missing_hardware_id() {
        let record = mapper()
            .map(&json!({ "model": "P300", "deviceState": "OFFLINE" }), Some("HW-3"))
            .unwrap();
        assert_eq!(record.id, "HW-3");
        assert!(!record.online);
    }

    #[test]
    fn online_defaults_to_true_without_state() {
        let record = mapper()
            .map(&json!({ "hardwareId": "HW-4", "model": "ANIUSB" }), None)
            .unwrap();
        assert!(record.online);
    }
}
