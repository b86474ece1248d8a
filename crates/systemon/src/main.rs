//! `systemon`: inspect and drive a Shure SystemOn fleet from the terminal.

mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose, cli.global.quiet);

    if let Err(err) = commands::dispatch(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Each `-v` opens up the engine crates before the rest of the stack;
/// `RUST_LOG` replaces the whole filter.
fn init_tracing(verbosity: u8, quiet: bool) {
    let directives = match (quiet, verbosity) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "warn,systemon_core=info,systemon_api=info",
        (false, 2) => "info,systemon=debug,systemon_core=debug,systemon_api=debug",
        _ => "debug,systemon=trace,systemon_core=trace,systemon_api=trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives)),
        )
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .init();
}
