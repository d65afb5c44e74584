//! CLI argument definitions.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "soc", version, about = "Battery state-of-charge estimator")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Knobs for a closed-loop run.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Simulated duration, s
    #[arg(long, default_value_t = 600.0)]
    pub seconds: f64,
    /// Commanded charger current, A (negative discharges)
    #[arg(long, default_value_t = -20.0, allow_hyphen_values = true)]
    pub current: f64,
    /// Initial true state of charge
    #[arg(long, default_value_t = 0.9)]
    pub soc0: f64,
    /// Initial monitor state of charge; defaults to --soc0
    #[arg(long = "soc-mon", value_name = "SOC")]
    pub soc_mon: Option<f64>,
    /// Battery temperature, °C
    #[arg(long, default_value_t = 25.0, allow_hyphen_values = true)]
    pub temp: f64,
    /// Tick period, s; defaults to battery.nom_dt
    #[arg(long)]
    pub dt: Option<f64>,
    /// Chemistry name or code; overrides battery.chemistry
    #[arg(long)]
    pub chemistry: Option<String>,
    /// OCV surface CSV (strict header soc,temp_c,voc) replacing the chemistry's table
    #[arg(long = "voc-csv", value_name = "FILE")]
    pub voc_csv: Option<PathBuf>,
    /// Report every N ticks
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub every: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the monitor from the simulator and report both estimates
    Run(RunArgs),
    /// Load, validate and build everything, then exit
    CheckConfig,
}
