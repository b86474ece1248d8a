// ── Runtime aggregator configuration ──
//
// Describes *how* to reach a SystemOn gateway and how the poller paces
// itself. Carries credential data and tuning knobs, never touches disk.
// The CLI builds an `AggregatorConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// Floor for the metadata (discovery) refresh interval.
pub const MIN_METADATA_REFRESH: Duration = Duration::from_secs(30);

/// Default discovery interval.
pub const DEFAULT_METADATA_REFRESH: Duration = Duration::from_secs(60);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. Gateways ship self-signed certs.
    #[default]
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for systemon_api::TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one aggregator instance (one gateway).
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Gateway root URL (e.g., `https://10.0.0.5:10000`).
    pub url: Url,
    /// Sent verbatim as `Authorization` when present.
    pub api_key: Option<SecretString>,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,

    /// Device-model allow-list. Empty means every model.
    pub model_filter: Vec<String>,
    /// Hardware-id allow-list. Empty means no id filter.
    pub hardware_id_filter: Vec<String>,

    /// Minimum spacing between discovery listings. See
    /// [`metadata_refresh`](Self::metadata_refresh) for the clamped value.
    pub metadata_refresh_timeout: Duration,
    /// Forwarded as `pageSize` on listing calls.
    pub devices_per_page: Option<u32>,

    /// Mapping file overriding the built-in model table.
    pub mapping_path: Option<PathBuf>,
    /// Replace cached records wholesale on detail fetch instead of only
    /// patching the online flag.
    pub full_detail_refresh: bool,

    /// Scheduler tick.
    pub tick: Duration,
    /// Pause between per-device iterations.
    pub cycle_delay: Duration,
    /// Consumer silence after which polling pauses.
    pub inactivity_timeout: Duration,
}

impl AggregatorConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            api_key: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            model_filter: Vec::new(),
            hardware_id_filter: Vec::new(),
            metadata_refresh_timeout: DEFAULT_METADATA_REFRESH,
            devices_per_page: None,
            mapping_path: None,
            full_detail_refresh: false,
            tick: Duration::from_secs(1),
            cycle_delay: Duration::from_secs(30),
            inactivity_timeout: Duration::from_secs(180),
        }
    }

    /// Discovery interval, never below [`MIN_METADATA_REFRESH`].
    pub fn metadata_refresh(&self) -> Duration {
        self.metadata_refresh_timeout.max(MIN_METADATA_REFRESH)
    }

    /// Hardware-id filter set without a model filter: listing is skipped.
    pub fn id_only_mode(&self) -> bool {
        !self.hardware_id_filter.is_empty() && self.model_filter.is_empty()
    }

    pub(crate) fn transport(&self) -> systemon_api::TransportConfig {
        systemon_api::TransportConfig {
            tls: (&self.tls).into(),
            timeout: self.timeout,
        }
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
pub fn parse_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
