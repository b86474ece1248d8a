//! Shared helpers for command handlers.

use std::fmt::Write as _;
use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::ProgressBar;

use systemon_core::{Aggregator, CycleReport, DeviceRecord};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Run one poll cycle inline, with a spinner on interactive terminals.
///
/// A cycle that leaves the cache empty while errors were recorded is
/// reported as a failure; an empty fleet without errors is not.
pub async fn refresh(aggregator: &Aggregator, global: &GlobalOpts) -> Result<CycleReport, CliError> {
    let spinner = (!global.quiet && std::io::stderr().is_terminal()).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_message("polling gateway...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = aggregator.refresh_now().await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = result?;
    tracing::debug!(?report, "refresh complete");

    if aggregator.retrieve_all().is_empty() {
        let diagnostics = aggregator.get_diagnostics();
        let mut details = String::new();
        for (key, message) in diagnostics.errors() {
            let _ = writeln!(details, "  {key}: {message}");
        }
        if !details.is_empty() {
            return Err(CliError::PollFailed { details });
        }
    }
    Ok(report)
}

/// Look up a cached device by hardware id.
pub fn find_device(aggregator: &Aggregator, id: &str) -> Result<Arc<DeviceRecord>, CliError> {
    aggregator
        .retrieve_by_ids(&[id.to_owned()])
        .into_iter()
        .next()
        .ok_or_else(|| CliError::NotFound {
            identifier: id.into(),
        })
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: message.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
