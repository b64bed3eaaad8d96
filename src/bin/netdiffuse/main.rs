//! netdiffuse CLI.

use std::io::{self, IsTerminal};

use anyhow::Context;
use clap::Parser;
use tracing::Level;

use netdiffuse::Scenario;

mod cli;
mod logging;
mod report;

use crate::cli::{Cli, Command, DescribeArgs, LogFormatArg, LogLevelArg, OutputFormatArg, RunArgs};
use crate::logging::{init_logging, LogConfig, LogFormat};

fn main() {
    let cli = Cli::parse();
    init_logging(&log_config_from_cli(&cli));

    let result = match &cli.command {
        Command::Run(args) => run(args),
        Command::Describe(args) => describe(args),
    };
    if let Err(error) = result {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn load(path: &std::path::Path) -> anyhow::Result<Scenario> {
    Scenario::from_path(path).with_context(|| format!("failed to load scenario {}", path.display()))
}

fn run(args: &RunArgs) -> anyhow::Result<()> {
    let mut scenario = load(&args.scenario)?;
    if let Some(epochs) = args.epochs {
        scenario = scenario.with_epochs(epochs);
    }
    if let Some(seed) = args.seed {
        scenario = scenario.with_seed(seed);
    }

    let experiment = scenario.build().context("failed to build scenario")?;
    let name = experiment.name().to_string();
    let seed = experiment.seed();
    let log = experiment.run().context("simulation failed")?;

    match args.format {
        OutputFormatArg::Table => report::print_run(&name, seed, &log),
        OutputFormatArg::Json => println!("{}", serde_json::to_string_pretty(&log)?),
    }
    Ok(())
}

fn describe(args: &DescribeArgs) -> anyhow::Result<()> {
    let experiment = load(&args.scenario)?.build().context("failed to build scenario")?;
    report::print_description(&experiment);
    Ok(())
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    LogConfig {
        level: match cli.log_level {
            LogLevelArg::Error => Level::ERROR,
            LogLevelArg::Warn => Level::WARN,
            LogLevelArg::Info => Level::INFO,
            LogLevelArg::Debug => Level::DEBUG,
            LogLevelArg::Trace => Level::TRACE,
        },
        format: match cli.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        },
        with_ansi: io::stderr().is_terminal(),
    }
}
