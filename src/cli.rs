//! Command-line interface for pipemgr.
use std::str::FromStr;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Wrapper around `LevelFilter` so clap can parse log levels from their
/// string names ("info", "debug", etc.).
#[derive(Clone, Copy, Debug)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    /// String representation suitable for `RUST_LOG`.
    pub fn as_str(&self) -> &'static str {
        match self.0 {
            LevelFilter::OFF => "off",
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
        }
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err("log level cannot be empty".into());
        }

        let level = match trimmed.to_ascii_lowercase().as_str() {
            "off" => Some(LevelFilter::OFF),
            "error" | "err" => Some(LevelFilter::ERROR),
            "warn" | "warning" => Some(LevelFilter::WARN),
            "info" => Some(LevelFilter::INFO),
            "debug" => Some(LevelFilter::DEBUG),
            "trace" => Some(LevelFilter::TRACE),
            _ => None,
        }
        .ok_or_else(|| format!("invalid log level '{trimmed}'"))?;

        Ok(LogLevelArg(level))
    }
}

/// Command-line interface for pipemgr.
#[derive(Parser)]
#[command(name = "pipemgr", version, author)]
#[command(about = "A single-slot supervisor for expense tracker pipeline jobs", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for pipemgr.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the resident supervisor that owns the pipeline slot.
    Serve {
        /// Path to the configuration file (defaults to `pipemgr.yaml`).
        #[arg(short, long)]
        config: Option<String>,

        /// Whether to daemonize the supervisor.
        #[arg(long)]
        daemonize: bool,
    },

    /// Start a pipeline service.
    Start {
        /// Service name (notion, gsheets).
        service: String,

        /// Environment (dev, prod).
        #[arg(short, long, default_value = "dev")]
        env: String,
    },

    /// Trigger the currently running pipeline.
    Trigger,

    /// Stop the currently running pipeline.
    Stop,

    /// Run a complete pipeline cycle: start, trigger, stop.
    Run {
        /// Service name (notion, gsheets).
        service: String,

        /// Environment (dev, prod).
        #[arg(short, long, default_value = "dev")]
        env: String,
    },

    /// Show the current pipeline runner status.
    Status {
        /// Emit machine-readable JSON output instead of a status line.
        #[arg(long)]
        json: bool,
    },

    /// Shut down the resident supervisor.
    Shutdown,
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
