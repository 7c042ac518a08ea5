// CLI argument definitions using Clap

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::codec::WireFormat;
use crate::config::TransportMode;

/// Publish and consume test-run lifecycle events
#[derive(Parser, Debug)]
#[command(name = "testmonitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test run lifecycle event monitor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose debug output
    #[arg(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Configuration file (defaults to $TESTMONITOR_CONFIG or .testmonitor.toml)
    #[arg(long, global = true, value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Receive events from a running monitor and print them
    Listen(ListenArgs),

    /// Feed report fragments through the monitor pipeline
    Replay(ReplayArgs),

    /// Show the effective configuration or write a default one
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ListenArgs {
    /// Endpoint name or socket path (defaults to the configured endpoint)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Transport role to play (defaults to the opposite of the monitor's)
    #[arg(long, value_name = "MODE")]
    pub mode: Option<TransportMode>,

    /// Wire format of incoming frames
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<WireFormat>,

    /// How long to wait for the monitor (milliseconds)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Print payloads as received instead of summaries
    #[arg(long, default_value_t = false)]
    pub raw: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// File with one fragment per line (reads stdin when omitted)
    pub file: Option<PathBuf>,

    /// Override the configured wire format
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<WireFormat>,

    /// Override the configured event log path
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Process name to present to the runner gate
    #[arg(long, value_name = "NAME")]
    pub as_runner: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Write a default configuration file to this path
    #[arg(long, value_name = "CONFIG_FILE")]
    pub init: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_listen() {
        let cli = Cli::try_parse_from([
            "testmonitor",
            "listen",
            "--mode",
            "client",
            "--format",
            "binary",
            "--raw",
        ])
        .expect("parse");

        let Commands::Listen(args) = cli.command else {
            panic!("expected listen");
        };
        assert_eq!(args.mode, Some(TransportMode::Client));
        assert_eq!(args.format, Some(WireFormat::Binary));
        assert!(args.raw);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["testmonitor", "replay", "events.txt", "-v", "--config", "m.toml"])
            .expect("parse");
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("m.toml")));
        assert!(matches!(cli.command, Commands::Replay(ReplayArgs { file: Some(_), .. })));
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!(Cli::try_parse_from(["testmonitor", "listen", "--format", "yaml"]).is_err());
    }
}
