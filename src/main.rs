//! OULAD ETL command line.

use std::io::{self, IsTerminal};

use clap::Parser;
use oulad_etl::logging::{init_logging, LogConfig, LogFormat};

mod cli;
mod commands;

use crate::cli::{Cli, Command, LogFormatArg};
use crate::commands::{print_tables, run_pipeline, summarize};

fn main() {
    let cli = Cli::parse();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let result = match &cli.command {
        Command::Run(args) => run_pipeline(args),
        Command::Summary(args) => summarize(args),
        Command::Tables => {
            print_tables();
            Ok(())
        }
    };
    if let Err(error) = result {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    LogConfig::from_verbosity(cli.verbose)
        .with_format(format)
        .with_ansi(cli.log_file.is_none() && io::stderr().is_terminal())
        .with_timestamps(cli.log_timestamps)
        .with_log_file(cli.log_file.clone())
}
