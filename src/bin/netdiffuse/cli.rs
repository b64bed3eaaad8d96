//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "netdiffuse",
    version,
    about = "Multi-layer compartmental diffusion on networks",
    long_about = "Run diffusion experiments declared as JSON scenarios.\n\n\
                  Each scenario names its graphs, layers, compartments and\n\
                  conditional transition rules."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (overridden by RUST_LOG when set).
    #[arg(long = "log-level", value_enum, default_value = "warn", global = true)]
    pub log_level: LogLevelArg,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build and simulate a scenario.
    Run(RunArgs),

    /// Print the network and model of a scenario without simulating.
    Describe(DescribeArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Path to the scenario JSON file.
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Override the scenario's epoch count.
    #[arg(long = "epochs", value_name = "N")]
    pub epochs: Option<usize>,

    /// Override the scenario's seed.
    #[arg(long = "seed", value_name = "SEED")]
    pub seed: Option<u64>,

    /// Output format.
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormatArg,
}

#[derive(Parser)]
pub struct DescribeArgs {
    /// Path to the scenario JSON file.
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,
}

/// Result output choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormatArg {
    Table,
    Json,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
