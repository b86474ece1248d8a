// ── Error bookkeeping and diagnostics ──
//
// Failures absorbed by the poller or the dispatcher land in the error
// tracker under `<category>` or `<category>[<hardwareId>]`. The consumer
// reads them back through the diagnostics map.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

/// Longest stored message, in characters, before the `...` marker.
pub const MAX_ERROR_MESSAGE: usize = 120;

const TRUNCATION_MARKER: &str = "...";

/// Build an error key from a category and an optional device id.
pub fn error_key(category: &str, device_id: Option<&str>) -> String {
    match device_id {
        Some(id) => format!("{category}[{id}]"),
        None => category.to_owned(),
    }
}

/// Latest error message per key. Entries live until cleared.
#[derive(Debug, Default)]
pub struct ErrorTracker {
    entries: DashMap<String, String>,
}

impl ErrorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, category: &str, device_id: Option<&str>, message: &str) {
        self.entries
            .insert(error_key(category, device_id), truncate(message));
    }

    /// Drop every entry keyed to `device_id`, whatever its category.
    pub fn clear_matching(&self, device_id: &str) {
        let suffix = format!("[{device_id}]");
        self.entries.retain(|key, _| !key.ends_with(&suffix));
    }

    /// Drop every global (device-less) entry.
    pub fn clear_global(&self) {
        self.entries.retain(|key, _| key.ends_with(']'));
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn all(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn truncate(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE {
        return message.to_owned();
    }
    let mut out: String = message.chars().take(MAX_ERROR_MESSAGE).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

// ── Diagnostics map ──────────────────────────────────────────────────

/// Flat string map handed to the consumer:
/// `adapterVersion`, `adapterUptime`, and one `Errors#<key>` per error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics(BTreeMap<String, String>);

impl Diagnostics {
    pub(crate) fn collect(started: Instant, errors: &ErrorTracker) -> Self {
        let uptime = Duration::from_secs(started.elapsed().as_secs());
        let mut map = BTreeMap::from([
            ("adapterVersion".to_owned(), env!("CARGO_PKG_VERSION").to_owned()),
            (
                "adapterUptime".to_owned(),
                humantime::format_duration(uptime).to_string(),
            ),
        ]);
        map.extend(
            errors
                .all()
                .into_iter()
                .map(|(key, message)| (format!("Errors#{key}"), message)),
        );
        Self(map)
    }

    /// Only the `Errors#` entries, with the prefix stripped.
    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().filter_map(|(k, v)| {
            k.strip_prefix("Errors#")
                .map(|key| (key, v.as_str()))
        })
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl Deref for Diagnostics {
    type Target = BTreeMap<String, String>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_messages_are_truncated_with_marker() {
        let tracker = ErrorTracker::new();
        tracker.record("TransportException", None, &"x".repeat(200));

        let stored = tracker.get("TransportException").unwrap_or_default();
        assert_eq!(stored.chars().count(), MAX_ERROR_MESSAGE + 3);
        assert!(stored.ends_with("..."));

        tracker.record("TransportException", None, &"y".repeat(MAX_ERROR_MESSAGE));
        let stored = tracker.get("TransportException").unwrap_or_default();
        assert_eq!(stored.len(), MAX_ERROR_MESSAGE);
    }

    #[test]
    fn clear_matching_only_touches_that_device() {
        let tracker = ErrorTracker::new();
        tracker.record("DeviceRetrievalException", Some("A"), "gone");
        tracker.record("TransportException", Some("A"), "timeout");
        tracker.record("TransportException", Some("AB"), "timeout");
        tracker.record("TransportException", None, "listing failed");

        tracker.clear_matching("A");
        let keys: Vec<String> = tracker.all().into_keys().collect();
        assert_eq!(keys, ["TransportException", "TransportException[AB]"]);

        tracker.clear_global();
        let keys: Vec<String> = tracker.all().into_keys().collect();
        assert_eq!(keys, ["TransportException[AB]"]);
    }

    #[test]
    fn diagnostics_prefix_error_keys() {
        let tracker = ErrorTracker::new();
        tracker.record("DeviceRetrievalException", Some("X"), "no model");

        let diag = Diagnostics::collect(Instant::now(), &tracker);
        assert_eq!(diag["adapterVersion"], env!("CARGO_PKG_VERSION"));
        assert_eq!(diag["adapterUptime"], "0s");
        assert_eq!(diag["Errors#DeviceRetrievalException[X]"], "no model");
        assert_eq!(
            diag.errors().collect::<Vec<_>>(),
            [("DeviceRetrievalException[X]", "no model")]
        );
    }
}
