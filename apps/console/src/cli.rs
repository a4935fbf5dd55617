//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::{path::PathBuf, time::Duration};

use crate::session::SessionConfig;

/// crashsim - synthetic vehicle crash telemetry simulator
#[derive(Parser, Debug)]
#[command(
    name = "crashsim",
    author,
    version,
    about = "Synthetic vehicle telemetry for driving scenarios and collision types",
    long_about = "Streams fake speed, acceleration, gyroscope and GPS readings at a fixed \n\
                  cadence for a chosen driving scenario or collision type, keeps a rolling \n\
                  chart window, and exports every sample to CSV or NDJSON."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream one run for a fixed duration, then stop and optionally export
    Run(RunArgs),

    /// Interactive operator console reading commands from stdin
    Console(ConsoleArgs),

    /// Print the scenario profile table
    Profiles(ProfilesArgs),
}

/// Knobs shared by every command that drives a session
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Publish period of the producer in milliseconds
    #[arg(long, default_value = "100")]
    pub tick_ms: u64,

    /// Redraw period of the renderer in milliseconds
    #[arg(long, default_value = "100")]
    pub render_ms: u64,

    /// Samples kept in the rolling chart window
    #[arg(long, default_value = "100")]
    pub history: usize,

    /// Fixed RNG seed for reproducible noise
    #[arg(long)]
    pub seed: Option<u64>,

    /// Dump every chart frame as JSON lines into this file
    #[arg(long)]
    pub frames: Option<PathBuf>,
}

impl SessionArgs {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick: Duration::from_millis(self.tick_ms.max(1)),
            render_period: Duration::from_millis(self.render_ms.max(1)),
            history_capacity: self.history.max(1),
            seed: self.seed,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Simulated speed in km/h
    #[arg(short, long)]
    pub speed: String,

    /// Driving scenario ("Urban Driving", highway, off-road, accident, ...)
    #[arg(long, default_value = "Urban Driving")]
    pub scenario: String,

    /// Collision type, required for the accident scenario ("Car to Bus", truck, ...)
    #[arg(long)]
    pub collision: Option<String>,

    /// How long to stream, in seconds
    #[arg(short, long, default_value = "5")]
    pub duration: f64,

    /// Export destination (.csv, or .ndjson/.jsonl for JSON lines)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ConsoleArgs {
    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args, Debug)]
pub struct ProfilesArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_parse_with_defaults() {
        let cli = Cli::try_parse_from(["crashsim", "run", "--speed", "50", "--scenario", "highway"]).unwrap();
        let Commands::Run(args) = cli.command else { panic!("expected run") };
        assert_eq!(args.speed, "50");
        assert_eq!(args.duration, 5.0);
        let cfg = args.session.session_config();
        assert_eq!(cfg.tick, Duration::from_millis(100));
        assert_eq!(cfg.history_capacity, 100);
        assert!(cfg.seed.is_none());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["crashsim", "-q", "-v", "profiles"]).is_err());
    }
}
