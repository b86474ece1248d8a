//! Control command handler.

use std::str::FromStr;

use strum::IntoEnumIterator;

use systemon_core::{Aggregator, ControlCommand, ControlOutcome};

use crate::cli::{ControlArgs, GlobalOpts};
use crate::error::CliError;

use super::util;

fn known_controls() -> String {
    ControlCommand::iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn handle(
    aggregator: &Aggregator,
    args: ControlArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let command = ControlCommand::from_str(&args.property).map_err(|_| CliError::UnknownControl {
        property: args.property.clone(),
        known: known_controls(),
    })?;

    if matches!(command, ControlCommand::Reboot | ControlCommand::Reset)
        && !util::confirm(&format!("{command} device {}?", args.device), global.yes)?
    {
        return Ok(());
    }

    let outcome = aggregator
        .apply_control(&args.device, &args.property, args.value.as_deref())
        .await?;

    match outcome {
        ControlOutcome::Ignored => Err(CliError::UnknownControl {
            property: args.property,
            known: known_controls(),
        }),
        ControlOutcome::Applied | ControlOutcome::Reinitialized => {
            if !global.quiet {
                let note = if outcome == ControlOutcome::Reinitialized {
                    " (device initialized first)"
                } else {
                    ""
                };
                match args.value {
                    Some(value) => eprintln!("✓ {command} = {value} on {}{note}", args.device),
                    None => eprintln!("✓ {command} sent to {}{note}", args.device),
                }
            }
            Ok(())
        }
    }
}
