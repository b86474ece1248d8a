//! CLI configuration: thin wrapper around `systemon_config` shared types.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --api-key, --models, ...).

use secrecy::SecretString;

use systemon_core::AggregatorConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use systemon_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-joined profile names, or `(none)`.
pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<_> = config.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

/// Build an `AggregatorConfig` from the config file, profile, and flags.
///
/// Flag values override the profile. Without a profile, `--host` alone is
/// enough to reach a gateway with default settings.
pub fn build_aggregator_config(global: &GlobalOpts) -> Result<AggregatorConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = match (cfg.profiles.get(&profile_name), &global.host) {
        (Some(profile), _) => profile.clone(),
        (None, Some(host)) => Profile::new(host.clone()),
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(&cfg),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if global.models.is_some() {
        profile.device_models.clone_from(&global.models);
    }
    if global.hardware_ids.is_some() {
        profile.hardware_ids.clone_from(&global.hardware_ids);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }

    let mut config =
        systemon_config::profile_to_aggregator_config(&cfg.defaults, &profile, &profile_name)?;
    if let Some(ref key) = global.api_key {
        config.api_key = Some(SecretString::from(key.clone()));
    }
    Ok(config)
}
