//! Device command handlers.

use std::sync::Arc;

use tabled::Tabled;

use systemon_core::{Aggregator, ControlKind, DeviceRecord};

use crate::cli::{DevicesArgs, DevicesCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Controls")]
    controls: String,
}

impl DeviceRow {
    fn new(d: &DeviceRecord, color: bool) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone().unwrap_or_default(),
            model: d.model.clone(),
            serial: d.serial_number.clone().unwrap_or_default(),
            state: output::paint_state(d.online, color),
            controls: d
                .controllable_properties
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

fn detail(d: &Arc<DeviceRecord>) -> String {
    let mut lines = vec![output::render_fields(&[
        ("ID", d.id.clone()),
        ("Name", d.name.clone().unwrap_or_else(|| "-".into())),
        ("Model", d.model.clone()),
        ("Serial", d.serial_number.clone().unwrap_or_else(|| "-".into())),
        ("State", output::paint_state(d.online, false)),
        ("Updated", d.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ])];
    if !d.properties.is_empty() {
        lines.push(String::new());
        lines.push("Properties:".into());
        lines.extend(d.properties.iter().map(|(k, v)| format!("  {k}: {v}")));
    }
    if !d.statistics.is_empty() {
        lines.push(String::new());
        lines.push("Statistics:".into());
        lines.extend(d.statistics.iter().map(|(k, v)| format!("  {k}: {v}")));
    }
    if !d.controllable_properties.is_empty() {
        lines.push(String::new());
        lines.push("Controls:".into());
        lines.extend(d.controllable_properties.iter().map(|c| match c.kind {
            ControlKind::Toggle => {
                format!("  {} (toggle): {}", c.name, c.value.as_deref().unwrap_or("-"))
            }
            ControlKind::Push => format!("  {} (push)", c.name),
        }));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    aggregator: &Aggregator,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    util::refresh(aggregator, global).await?;

    match args.command {
        DevicesCommand::List { online } => {
            let color = output::should_color(&global.color);
            let devices: Vec<Arc<DeviceRecord>> = aggregator
                .retrieve_all()
                .iter()
                .filter(|d| !online || d.online)
                .cloned()
                .collect();
            let out = output::render_list(
                &global.output,
                &devices,
                |d| DeviceRow::new(d, color),
                |d| d.id.clone(),
            )?;
            output::print_output(&out, global.quiet);
            if matches!(global.output, OutputFormat::Table) && !global.quiet {
                eprintln!("{}", output::fleet_summary(&devices));
            }
            Ok(())
        }

        DevicesCommand::Get { device } => {
            let found = util::find_device(aggregator, &device)?;
            let out = output::render_single(&global.output, &found, detail, |d| d.id.clone())?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
