use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{handle_command, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.command.verbose());

    handle_command(cli.command)
}

// RUST_LOG wins over --verbose. Library `log` records are forwarded by the
// subscriber's log bridge.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
