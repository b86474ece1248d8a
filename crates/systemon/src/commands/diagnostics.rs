//! Diagnostics command handler.

use tabled::Tabled;

use systemon_core::{Aggregator, Diagnostics};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct EntryRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn detail(diagnostics: &Diagnostics) -> String {
    let rows: Vec<EntryRow> = diagnostics
        .iter()
        .map(|(key, value)| EntryRow {
            key: key.clone(),
            value: value.clone(),
        })
        .collect();
    output::render_table(&rows)
}

pub async fn handle(aggregator: &Aggregator, global: &GlobalOpts) -> Result<(), CliError> {
    // Poll failures show up in the map itself.
    if let Err(e) = util::refresh(aggregator, global).await {
        tracing::debug!(error = %e, "refresh before diagnostics failed");
    }

    let diagnostics = aggregator.get_diagnostics();
    let out = output::render_single(&global.output, &diagnostics, detail, |d| {
        d.errors()
            .map(|(key, _)| key.to_owned())
            .collect::<Vec<_>>()
            .join("\n")
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
