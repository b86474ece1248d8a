//! Shared configuration for SystemOn tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `systemon_core::AggregatorConfig`. The CLI layers
//! its flag overrides on top of what this crate produces.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use systemon_core::{AggregatorConfig, TlsVerification, parse_csv};

/// Keyring service name for stored API keys.
const KEYRING_SERVICE: &str = "systemon";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named gateway profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up `name`, falling back to `default_profile` and then
    /// `"default"`. Returns the resolved name alongside the profile.
    pub fn profile<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get(name)
            .map(|profile| (name, profile))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Accept self-signed gateway certificates.
    #[serde(default = "default_insecure")]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: default_insecure(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_insecure() -> bool {
    true
}
fn default_timeout() -> u64 {
    30
}

/// A named gateway profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Gateway host name or address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `https` or `http`.
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// API key (plaintext, prefer keyring or env var).
    pub api_key: Option<String>,

    /// Environment variable name containing the API key.
    pub api_key_env: Option<String>,

    /// Comma-separated device-model filter.
    pub device_models: Option<String>,

    /// Comma-separated hardware-id filter.
    pub hardware_ids: Option<String>,

    /// Seconds between discovery listings (clamped to 30).
    pub metadata_refresh: Option<u64>,

    /// Page size hint for listings.
    pub devices_per_page: Option<u32>,

    /// Mapping file overriding the built-in model table.
    pub mapping_file: Option<PathBuf>,

    /// Replace cached records on every detail fetch.
    #[serde(default)]
    pub full_detail_refresh: bool,

    /// Seconds between per-device passes.
    pub cycle_delay: Option<u64>,

    /// Seconds of consumer silence before polling pauses.
    pub inactivity_timeout: Option<u64>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

fn default_port() -> u16 {
    10000
}
fn default_protocol() -> String {
    "https".into()
}

impl Profile {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            protocol: default_protocol(),
            ..Self::default()
        }
    }

    /// `<protocol>://<host>:<port>`.
    pub fn gateway_url(&self) -> Result<Url, ConfigError> {
        if !matches!(self.protocol.as_str(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "protocol".into(),
                reason: format!("expected 'http' or 'https', got '{}'", self.protocol),
            });
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "host".into(),
                reason: "must not be empty".into(),
            });
        }
        let raw = format!("{}://{}:{}", self.protocol, self.host.trim(), self.port);
        Url::parse(&raw).map_err(|e| ConfigError::Validation {
            field: "host".into(),
            reason: format!("invalid URL {raw}: {e}"),
        })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "systemon", "systemon").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("systemon");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Env vars use `SYSTEMON_` with `__` as the nesting separator, e.g.
/// `SYSTEMON_PROFILES__LAB__HOST`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SYSTEMON_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is broken.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve an API key from the credential chain. `None` means the gateway
/// is reached without an `Authorization` header.
pub fn resolve_api_key(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    // 1. Profile's api_key_env → env var lookup
    if let Some(ref env_name) = profile.api_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    profile
        .api_key
        .as_ref()
        .map(|key| SecretString::from(key.clone()))
}

/// Store a profile's API key in the system keyring.
pub fn store_api_key(profile_name: &str, api_key: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))?;
    entry.set_password(api_key)?;
    Ok(())
}

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/api-key")
}

// ── Translation ─────────────────────────────────────────────────────

/// Build an `AggregatorConfig` from a profile, no CLI flag overrides.
pub fn profile_to_aggregator_config(
    defaults: &Defaults,
    profile: &Profile,
    profile_name: &str,
) -> Result<AggregatorConfig, ConfigError> {
    let mut config = AggregatorConfig::new(profile.gateway_url()?);
    config.api_key = resolve_api_key(profile, profile_name);

    config.tls = if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    config.model_filter = profile.device_models.as_deref().map(parse_csv).unwrap_or_default();
    config.hardware_id_filter = profile.hardware_ids.as_deref().map(parse_csv).unwrap_or_default();

    if let Some(secs) = profile.metadata_refresh {
        config.metadata_refresh_timeout = Duration::from_secs(secs);
    }
    config.devices_per_page = profile.devices_per_page;
    config.mapping_path.clone_from(&profile.mapping_file);
    config.full_detail_refresh = profile.full_detail_refresh;
    if let Some(secs) = profile.cycle_delay {
        config.cycle_delay = Duration::from_secs(secs);
    }
    if let Some(secs) = profile.inactivity_timeout {
        config.inactivity_timeout = Duration::from_secs(secs);
    }

    Ok(config)
}
