//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shipper - log delivery agent
#[derive(Parser, Debug)]
#[command(
    name = "shipper",
    author,
    version,
    about = "Deliver log lines to a transport with durable read checkpoints",
    long_about = "Reads log files (or stdin), delivers their lines through the configured \n\
                  transport with reconnect backoff, and records how far each file was \n\
                  consumed so the next run resumes where this one stopped."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SHIPPER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SHIPPER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deliver files (or stdin) through the configured transport
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Show stored read positions
    Position(PositionArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, default_value = "shipper.toml", env = "SHIPPER_CONFIG")]
    pub config: PathBuf,

    /// Log file to ship; repeatable. Reads stdin when omitted.
    #[arg(short, long = "file")]
    pub files: Vec<PathBuf>,

    /// Override the host name stamped on events
    #[arg(long, env = "SHIPPER_HOSTNAME")]
    pub hostname: Option<String>,

    /// Override the sincedb path from configuration
    #[arg(long, env = "SHIPPER_SINCEDB")]
    pub sincedb: Option<PathBuf>,

    /// Maximum lines per callback
    #[arg(long, default_value = "100", env = "SHIPPER_BATCH_LINES")]
    pub batch_lines: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "SHIPPER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without shipping
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "shipper.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `position` command
#[derive(Parser, Debug)]
pub struct PositionArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "shipper.toml")]
    pub config: PathBuf,

    /// Files to look up
    #[arg(required_unless_present = "all")]
    pub paths: Vec<PathBuf>,

    /// List every stored checkpoint
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_collect_files() {
        let cli = Cli::parse_from([
            "shipper", "run", "--config", "a.toml", "-f", "x.log", "--file", "y.log",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.files, vec![PathBuf::from("x.log"), PathBuf::from("y.log")]);
        assert_eq!(args.batch_lines, 100);
    }

    #[test]
    fn test_position_requires_paths_or_all() {
        assert!(Cli::try_parse_from(["shipper", "position"]).is_err());
        assert!(Cli::try_parse_from(["shipper", "position", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["shipper", "position", "a.log"]).is_ok());
    }
}
