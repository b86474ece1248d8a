//! Rendering for fleet data.
//!
//! Lists go through [`render_list`], single records through
//! [`render_single`]. `table` is for people; `json`, `json-compact` and
//! `yaml` serialize the records as-is; `plain` prints one hardware id (or
//! key) per line for shell pipelines. Device state and change markers share
//! one palette so `devices list` and `watch` read the same.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use systemon_core::DeviceRecord;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Palette ──────────────────────────────────────────────────────────

/// Whether stdout gets ANSI colors.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

pub fn paint_state(online: bool, color: bool) -> String {
    let label = if online { "online" } else { "offline" };
    match (online, color) {
        (_, false) => label.to_owned(),
        (true, true) => label.green().to_string(),
        (false, true) => label.red().to_string(),
    }
}

/// Leading marker of a fleet change line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Added,
    Removed,
    Changed,
}

pub fn paint_marker(marker: Marker, color: bool) -> String {
    let symbol = match marker {
        Marker::Added => "+",
        Marker::Removed => "-",
        Marker::Changed => "~",
    };
    if !color {
        return symbol.to_owned();
    }
    match marker {
        Marker::Added => symbol.green().to_string(),
        Marker::Removed => symbol.red().to_string(),
        Marker::Changed => symbol.yellow().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list in the chosen format. `to_row` feeds the table, `id_fn`
/// the plain listing.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render one item; `detail_fn` produces the human view.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    Ok(match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => serde_json::to_string_pretty(data)?,
        OutputFormat::JsonCompact => serde_json::to_string(data)?,
        OutputFormat::Yaml => serde_yaml::to_string(data)?,
        OutputFormat::Plain => id_fn(data),
    })
}

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// `Label:  value` lines with the values aligned on one column.
pub fn render_fields(fields: &[(&str, String)]) -> String {
    let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;
    fields
        .iter()
        .map(|(label, value)| {
            let label = format!("{label}:");
            format!("{label:<width$} {value}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-line footer for a device table.
pub fn fleet_summary(devices: &[Arc<DeviceRecord>]) -> String {
    let online = devices.iter().filter(|d| d.online).count();
    let noun = if devices.len() == 1 { "device" } else { "devices" };
    format!("{} {noun}, {online} online", devices.len())
}

/// Print to stdout unless `--quiet` or empty.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}
