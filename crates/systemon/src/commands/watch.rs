//! `watch`: run the background poller and print fleet changes.

use std::collections::HashMap;
use std::sync::Arc;

use owo_colors::OwoColorize;
use serde::Serialize;

use systemon_core::{Aggregator, DeviceRecord, FleetSnapshot};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output::{self, Marker};

/// One observed difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum FleetEvent {
    Added { id: String, model: String },
    Removed { id: String },
    Online { id: String, online: bool },
    Control { id: String, name: String, value: String },
}

/// Compare snapshots by hardware id.
pub fn diff(previous: &HashMap<String, Arc<DeviceRecord>>, next: &FleetSnapshot) -> Vec<FleetEvent> {
    let mut events = Vec::new();

    for record in next.iter() {
        let Some(old) = previous.get(&record.id) else {
            events.push(FleetEvent::Added {
                id: record.id.clone(),
                model: record.model.clone(),
            });
            continue;
        };
        if old.online != record.online {
            events.push(FleetEvent::Online {
                id: record.id.clone(),
                online: record.online,
            });
        }
        for control in &record.controllable_properties {
            let before = old.control(&control.name).and_then(|c| c.value.as_deref());
            if let Some(value) = control.value.as_deref() {
                if before != Some(value) {
                    events.push(FleetEvent::Control {
                        id: record.id.clone(),
                        name: control.name.clone(),
                        value: value.to_owned(),
                    });
                }
            }
        }
    }

    let mut removed: Vec<&String> = previous
        .keys()
        .filter(|id| !next.iter().any(|r| &r.id == *id))
        .collect();
    removed.sort();
    events.extend(removed.into_iter().map(|id| FleetEvent::Removed { id: id.clone() }));
    events
}

fn render_event(event: &FleetEvent, color: bool) -> String {
    let (marker, text) = match event {
        FleetEvent::Added { id, model } => (Marker::Added, format!("{id} ({model}) discovered")),
        FleetEvent::Removed { id } => (Marker::Removed, format!("{id} evicted")),
        FleetEvent::Online { id, online } => {
            (Marker::Changed, format!("{id} {}", output::paint_state(*online, color)))
        }
        FleetEvent::Control { id, name, value } => (Marker::Changed, format!("{id} {name} = {value}")),
    };
    let time = chrono::Local::now().format("%H:%M:%S").to_string();
    let time = if color { time.dimmed().to_string() } else { time };
    format!("{time} {} {text}", output::paint_marker(marker, color))
}

fn emit(events: &[FleetEvent], global: &GlobalOpts, color: bool) -> Result<(), CliError> {
    for event in events {
        let line = match global.output {
            OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(event)?,
            _ => render_event(event, color),
        };
        output::print_output(&line, global.quiet);
    }
    Ok(())
}

pub async fn handle(
    aggregator: &Aggregator,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut snapshots = aggregator.subscribe();
    let mut seen: HashMap<String, Arc<DeviceRecord>> = HashMap::new();
    let mut ticker = tokio::time::interval(args.interval);

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    aggregator.start();
    if !global.quiet {
        eprintln!("watching {} (Ctrl-C to stop)", aggregator.config().url);
    }

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = ticker.tick() => {
                // Reading keeps the poller from pausing.
                aggregator.retrieve_all();
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                emit(&diff(&seen, &snapshot), global, color)?;
                seen = snapshot.iter().map(|r| (r.id.clone(), Arc::clone(r))).collect();
            }
        }
    }

    aggregator.stop().await;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use systemon_core::{ControlKind, ControllableProperty};

    use super::*;

    fn record(id: &str, online: bool, mute: Option<&str>) -> Arc<DeviceRecord> {
        Arc::new(DeviceRecord {
            id: id.into(),
            model: "MXA310".into(),
            name: None,
            serial_number: None,
            online,
            properties: BTreeMap::new(),
            statistics: BTreeMap::new(),
            controllable_properties: vec![ControllableProperty {
                name: "Mute".into(),
                kind: ControlKind::Toggle,
                value: mute.map(str::to_owned),
            }],
            last_updated: Utc::now(),
        })
    }

    fn index(records: &[Arc<DeviceRecord>]) -> HashMap<String, Arc<DeviceRecord>> {
        records.iter().map(|r| (r.id.clone(), Arc::clone(r))).collect()
    }

    #[test]
    fn first_snapshot_reports_every_device_as_added() {
        let next: FleetSnapshot = Arc::new(vec![record("A", true, None), record("B", true, None)]);
        let events = diff(&HashMap::new(), &next);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], FleetEvent::Added { id, .. } if id == "A"));
    }

    #[test]
    fn changes_and_removals_are_reported() {
        let before = index(&[record("A", true, Some("false")), record("B", true, None)]);
        let next: FleetSnapshot = Arc::new(vec![record("A", false, Some("true"))]);

        let events = diff(&before, &next);
        assert_eq!(
            events,
            vec![
                FleetEvent::Online {
                    id: "A".into(),
                    online: false
                },
                FleetEvent::Control {
                    id: "A".into(),
                    name: "Mute".into(),
                    value: "true".into()
                },
                FleetEvent::Removed { id: "B".into() },
            ]
        );
    }

    #[test]
    fn identical_snapshots_are_quiet() {
        let records = vec![record("A", true, Some("true"))];
        let next: FleetSnapshot = Arc::new(records.clone());
        assert!(diff(&index(&records), &next).is_empty());
    }

    #[test]
    fn events_serialize_with_tag() {
        let json = serde_json::to_value(FleetEvent::Removed { id: "X".into() }).unwrap();
        assert_eq!(json, serde_json::json!({ "event": "removed", "id": "X" }));
    }
}
