// Main entry point for testmonitor

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use testmonitor::cli::{Cli, Commands};
use testmonitor::commands;
use testmonitor::config::Config;
use testmonitor::logging;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    debug!("Starting testmonitor v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };

    match &cli.command {
        Commands::Listen(args) => commands::handle_listen(&config, args),
        Commands::Replay(args) => commands::handle_replay(&config, args),
        Commands::Config(args) => commands::handle_config(&config, args),
    }
}
