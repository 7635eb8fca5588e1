use clap::{Args, Parser, Subcommand, ValueHint};
use std::path::PathBuf;
use voltset_scenarios::{Outage, ScaleAdjustment};

use crate::common::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "voltset", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sample randomized scenarios and write a training dataset
    ///
    /// Rows are flushed to the CSV as each scenario converges. A run that is
    /// killed part way keeps the rows written so far, but the summary and the
    /// manifest are only written once every scenario has run.
    Sample(SampleArgs),
    /// Solve the circuit once and print setpoints and bus voltages
    ///
    /// With --scale or --outage, solve the unmodified circuit and the modified
    /// one and print both voltages per bus.
    Solve(SolveArgs),
    /// List loads and generators with their current setpoints
    Inspect {
        #[command(flatten)]
        oracle: OracleArgs,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Sampler configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Sampler configuration (YAML, JSON or TOML); defaults apply when omitted
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    /// Output CSV path (overrides the config)
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub out: Option<PathBuf>,
    /// Number of scenarios (overrides the config)
    #[arg(long)]
    pub scenarios: Option<usize>,
    /// RNG seed (overrides the config)
    #[arg(long)]
    pub seed: Option<u64>,
    /// Skip writing `<out>.manifest.json`
    #[arg(long)]
    pub no_manifest: bool,
    #[command(flatten)]
    pub oracle: OracleArgs,
}

#[derive(Args, Debug)]
pub struct SolveArgs {
    #[command(flatten)]
    pub oracle: OracleArgs,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Scale loads or generators, e.g. `load:L7=25` or `generator:*=-10` (repeatable)
    #[arg(long, value_name = "CATEGORY:NAME=PCT")]
    pub scale: Vec<ScaleAdjustment>,
    /// Take a line or transformer out of service, e.g. `line:L12` (repeatable)
    #[arg(long, value_name = "KIND:NAME")]
    pub outage: Vec<Outage>,
}

/// Where the circuit comes from: an engine process or an in-memory fixture.
#[derive(Args, Debug, Clone)]
pub struct OracleArgs {
    /// Engine name, looked up under ~/.voltset/engines and on PATH
    #[arg(long)]
    pub engine: Option<String>,
    /// Explicit engine executable
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    pub engine_bin: Option<PathBuf>,
    /// Circuit file compiled by the engine
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub circuit: Option<PathBuf>,
    /// Fixture circuit served in-process instead of an engine
    #[arg(
        long,
        value_hint = ValueHint::FilePath,
        conflicts_with_all = ["engine", "engine_bin", "circuit"]
    )]
    pub fixture: Option<PathBuf>,
    /// Engine solver iteration limit
    #[arg(long, default_value_t = 1000)]
    pub max_iterations: u32,
    /// Engine control iteration limit
    #[arg(long, default_value_t = 100)]
    pub max_control_iterations: u32,
    /// Give up on an engine that takes longer than this to answer a request
    #[arg(long, value_name = "SECS")]
    pub request_timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Check a sampler configuration file
    Validate {
        /// Path to the configuration file
        #[arg(value_hint = ValueHint::FilePath)]
        file: PathBuf,
    },
    /// Print the default configuration as YAML
    Template {
        /// Write the template to a file instead of stdout
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
    },
}
