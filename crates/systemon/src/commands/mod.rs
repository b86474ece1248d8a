//! Command dispatch: bridges CLI args -> aggregator calls -> output formatting.

pub mod config_cmd;
pub mod control;
pub mod devices;
pub mod diagnostics;
pub mod util;
pub mod watch;

use clap::CommandFactory;
use clap_complete::Shell;

use systemon_core::Aggregator;

use crate::cli::{Cli, Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Run one parsed invocation. Only gateway-bound commands build an
/// aggregator; `config` and `completions` work without a profile.
pub async fn dispatch(cli: Cli) -> Result<(), CliError> {
    let Cli { global, command } = cli;
    match command {
        Command::Config(args) => config_cmd::handle(args, &global),
        Command::Completions(args) => {
            print_completions(args.shell);
            Ok(())
        }
        Command::Devices(args) => devices::handle(&connect(&global)?, args, &global).await,
        Command::Control(args) => control::handle(&connect(&global)?, args, &global).await,
        Command::Diagnostics => diagnostics::handle(&connect(&global)?, &global).await,
        Command::Watch(args) => watch::handle(&connect(&global)?, &args, &global).await,
    }
}

/// Resolve the profile and build the aggregator. No network I/O.
fn connect(global: &GlobalOpts) -> Result<Aggregator, CliError> {
    let config = config::build_aggregator_config(global)?;
    tracing::debug!(
        url = %config.url,
        models = ?config.model_filter,
        hardware_ids = config.hardware_id_filter.len(),
        "building aggregator"
    );
    Ok(Aggregator::new(config)?)
}

fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "systemon", &mut std::io::stdout());
}
