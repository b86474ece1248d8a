// ── Fleet cache ──
//
// Concurrent storage of device records with O(1) lookups and push-based
// change notification via a `watch` channel. Reads never lock; writers
// serialize on a small mutex so every published snapshot reflects a
// completed mutation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{ControlKind, DeviceRecord};

/// Shared snapshot type handed to consumers.
pub type FleetSnapshot = Arc<Vec<Arc<DeviceRecord>>>;

/// Outcome of a bulk merge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted: usize,
    pub updated: usize,
}

/// The single source of truth for `retrieve`.
///
/// Records only ever enter through a merge, so every key maps to a
/// fully built record. Existing entries change in two ways: the `online`
/// flag and controllable-property values are patched in place; everything
/// else is replaced wholesale.
pub struct FleetCache {
    by_id: DashMap<String, Arc<DeviceRecord>>,

    /// Full snapshot, rebuilt after each mutation, sorted by id.
    snapshot: watch::Sender<FleetSnapshot>,

    /// Held across a mutation and its snapshot rebuild.
    writer: Mutex<()>,
}

impl Default for FleetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FleetCache {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            by_id: DashMap::new(),
            snapshot,
            writer: Mutex::new(()),
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current snapshot (cheap `Arc` clone, never blocks on writers).
    pub fn get_all(&self) -> FleetSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.by_id.iter().map(|r| r.key().clone()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<FleetSnapshot> {
        self.snapshot.subscribe()
    }

    // ── Writes ───────────────────────────────────────────────────────

    /// Merge freshly fetched records.
    ///
    /// New ids are inserted. For existing ids, `full_refresh` replaces the
    /// record wholesale; otherwise only `online` and the timestamp change.
    /// One snapshot is published after the whole batch.
    pub fn upsert_bulk(&self, records: Vec<DeviceRecord>, full_refresh: bool) -> MergeStats {
        let _guard = self.lock_writer();
        let stats = self.merge_locked(records, full_refresh);
        self.rebuild_snapshot();
        stats
    }

    /// Apply a discovery listing: merge `records` (online-only for known
    /// ids), then evict every id outside `keep`. Publishes one snapshot.
    pub fn sync_listing(
        &self,
        records: Vec<DeviceRecord>,
        keep: &HashSet<String>,
    ) -> (MergeStats, Vec<String>) {
        let _guard = self.lock_writer();
        let stats = self.merge_locked(records, false);
        let evicted = self.remove_locked(|record| !keep.contains(&record.id));
        self.rebuild_snapshot();
        (stats, evicted)
    }

    /// Patch the online flag. Returns `false` when the id is not cached.
    pub fn patch_online(&self, id: &str, online: bool) -> bool {
        self.patch(id, |record| {
            record.online = online;
            record.last_updated = Utc::now();
        })
    }

    /// Set a toggle's cached value (and the property backing it).
    ///
    /// Push controls carry no value and are left untouched. Returns `true`
    /// when a value changed.
    pub fn patch_controllable_value(&self, id: &str, name: &str, value: &str) -> bool {
        let is_toggle = self
            .get(id)
            .and_then(|r| r.control(name).map(|c| c.kind == ControlKind::Toggle))
            .unwrap_or(false);
        if !is_toggle {
            return false;
        }

        self.patch(id, |record| {
            if let Some(control) = record
                .controllable_properties
                .iter_mut()
                .find(|c| c.name == name)
            {
                control.value = Some(value.to_owned());
            }
            if record.properties.contains_key(name) {
                record.properties.insert(name.to_owned(), value.to_owned());
            }
        })
    }

    /// Remove every record matching `predicate`. Returns the removed ids.
    pub fn remove_if(&self, mut predicate: impl FnMut(&DeviceRecord) -> bool) -> Vec<String> {
        let _guard = self.lock_writer();
        let doomed = self.remove_locked(&mut predicate);
        if !doomed.is_empty() {
            self.rebuild_snapshot();
        }
        doomed
    }

    pub fn remove(&self, id: &str) -> Option<Arc<DeviceRecord>> {
        let _guard = self.lock_writer();
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    pub fn clear(&self) {
        let _guard = self.lock_writer();
        self.by_id.clear();
        self.rebuild_snapshot();
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn merge_locked(&self, records: Vec<DeviceRecord>, full_refresh: bool) -> MergeStats {
        let mut stats = MergeStats::default();

        for record in records {
            let existing = self.by_id.get(&record.id).map(|r| Arc::clone(r.value()));
            let next = match existing {
                None => {
                    stats.inserted += 1;
                    record
                }
                Some(_) if full_refresh => {
                    stats.updated += 1;
                    record
                }
                Some(old) => {
                    stats.updated += 1;
                    DeviceRecord {
                        online: record.online,
                        last_updated: record.last_updated,
                        ..(*old).clone()
                    }
                }
            };
            self.by_id.insert(next.id.clone(), Arc::new(next));
        }
        stats
    }

    fn remove_locked(&self, mut predicate: impl FnMut(&DeviceRecord) -> bool) -> Vec<String> {
        let doomed: Vec<String> = self
            .by_id
            .iter()
            .filter(|r| predicate(r.value()))
            .map(|r| r.key().clone())
            .collect();
        for id in &doomed {
            self.by_id.remove(id);
        }
        doomed
    }

    fn patch(&self, id: &str, apply: impl FnOnce(&mut DeviceRecord)) -> bool {
        let _guard = self.lock_writer();
        let Some(mut entry) = self.by_id.get_mut(id) else {
            return false;
        };
        let mut record = (**entry.value()).clone();
        apply(&mut record);
        *entry.value_mut() = Arc::new(record);
        drop(entry);

        self.rebuild_snapshot();
        true
    }

    fn lock_writer(&self) -> std::sync::MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Collect all values into a sorted snapshot and broadcast it.
    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<DeviceRecord>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.id.cmp(&b.id));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::model::ControllableProperty;

    fn record(id: &str, online: bool) -> DeviceRecord {
        DeviceRecord {
            id: id.into(),
            model: "MXA310".into(),
            name: Some(format!("mic {id}")),
            serial_number: None,
            online,
            properties: BTreeMap::from([("Mute".to_string(), "false".to_string())]),
            statistics: BTreeMap::new(),
            controllable_properties: vec![
                ControllableProperty {
                    name: "Mute".into(),
                    kind: ControlKind::Toggle,
                    value: Some("false".into()),
                },
                ControllableProperty {
                    name: "Reboot".into(),
                    kind: ControlKind::Push,
                    value: None,
                },
            ],
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn upsert_reports_inserts_and_updates() {
        let cache = FleetCache::new();
        let stats = cache.upsert_bulk(vec![record("A", true), record("B", true)], false);
        assert_eq!(stats, MergeStats { inserted: 2, updated: 0 });

        let stats = cache.upsert_bulk(vec![record("B", false), record("C", true)], false);
        assert_eq!(stats, MergeStats { inserted: 1, updated: 1 });
        assert_eq!(cache.ids(), ["A", "B", "C"]);
    }

    #[test]
    fn partial_refresh_only_patches_online() {
        let cache = FleetCache::new();
        cache.upsert_bulk(vec![record("A", true)], false);

        let mut fresh = record("A", false);
        fresh.name = Some("renamed".into());
        cache.upsert_bulk(vec![fresh.clone()], false);

        let cached = cache.get("A").unwrap();
        assert!(!cached.online);
        assert_eq!(cached.name.as_deref(), Some("mic A"));

        cache.upsert_bulk(vec![fresh], true);
        assert_eq!(cache.get("A").unwrap().name.as_deref(), Some("renamed"));
    }

    #[test]
    fn toggle_patch_updates_control_and_property() {
        let cache = FleetCache::new();
        cache.upsert_bulk(vec![record("A", true)], false);

        assert!(cache.patch_controllable_value("A", "Mute", "1"));
        let cached = cache.get("A").unwrap();
        assert_eq!(cached.control("Mute").unwrap().value.as_deref(), Some("1"));
        assert_eq!(cached.properties["Mute"], "1");
    }

    #[test]
    fn push_and_unknown_patches_are_ignored() {
        let cache = FleetCache::new();
        cache.upsert_bulk(vec![record("A", true)], false);
        let before = cache.get("A").unwrap();

        assert!(!cache.patch_controllable_value("A", "Reboot", "1"));
        assert!(!cache.patch_controllable_value("A", "Volume", "3"));
        assert!(!cache.patch_controllable_value("Z", "Mute", "1"));
        assert_eq!(cache.get("A").unwrap(), before);
    }

    #[test]
    fn remove_if_returns_removed_ids() {
        let cache = FleetCache::new();
        cache.upsert_bulk(
            vec![record("A", true), record("B", false), record("C", true)],
            false,
        );

        assert_eq!(cache.remove_if(|r| !r.online), ["B"]);
        assert!(cache.remove_if(|r| r.id == "Z").is_empty());
        assert_eq!(cache.ids(), ["A", "C"]);
    }

    #[test]
    fn sync_listing_merges_then_evicts_in_one_snapshot() {
        let cache = FleetCache::new();
        cache.upsert_bulk(vec![record("A", true), record("B", true)], false);
        let mut rx = cache.subscribe();
        rx.borrow_and_update();

        let mut fresh = record("B", false);
        fresh.name = Some("ignored".into());
        let keep = HashSet::from(["B".to_string(), "C".to_string()]);
        let (stats, evicted) = cache.sync_listing(vec![fresh, record("C", true)], &keep);

        assert_eq!(stats, MergeStats { inserted: 1, updated: 1 });
        assert_eq!(evicted, ["A"]);
        assert_eq!(cache.ids(), ["B", "C"]);
        let b = cache.get("B").unwrap();
        assert!(!b.online);
        assert_eq!(b.name.as_deref(), Some("mic B"));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 2);
    }

    #[test]
    fn snapshot_tracks_mutations() {
        let cache = FleetCache::new();
        let mut rx = cache.subscribe();
        assert!(cache.get_all().is_empty());

        cache.upsert_bulk(vec![record("B", true), record("A", true)], false);
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].id, "A");

        cache.patch_online("A", false);
        assert!(!cache.get_all()[0].online);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get_all().is_empty());
    }
}
