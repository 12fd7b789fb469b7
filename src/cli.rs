//! CLI argument definitions for the OULAD ETL.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(
    name = "oulad-etl",
    version,
    about = "Clean, join and encode the Open University Learning Analytics Dataset",
    long_about = "Clean, join and ordinally encode the seven OULAD tables.\n\n\
                  Reads the delimited bundle (one .csv per table) and, when present, the\n\
                  multi-sheet workbook, and writes cleaned tables, the joined record set\n\
                  and the encoded student table as delimited text."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Prefix log lines with timestamps.
    #[arg(long = "log-timestamps", global = true)]
    pub log_timestamps: bool,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the full pipeline and write outputs.
    Run(RunArgs),

    /// Print shape and missing-value summaries of the raw tables.
    Summary(SourceArgs),

    /// List the logical tables with their physical names per layout.
    Tables,
}

#[derive(Parser)]
pub struct SourceArgs {
    /// Directory holding the delimited bundle.
    #[arg(long = "data-dir", value_name = "DIR", env = "OULAD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Workbook to read as well (default: first *.xlsx in the data directory).
    #[arg(long = "workbook", value_name = "PATH")]
    pub workbook: Option<PathBuf>,
}

#[derive(Parser)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output directory (default: `processed` next to the data directory).
    #[arg(long = "processed-dir", value_name = "DIR")]
    pub processed_dir: Option<PathBuf>,

    /// JSON pipeline config; flags override its fields.
    #[arg(long = "config", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Join every match when a lookup table has duplicate keys, instead of failing.
    #[arg(long = "many-to-many")]
    pub many_to_many: bool,

    /// Threads used to clean tables in parallel.
    #[arg(long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    /// Write the run summary as JSON.
    #[arg(long = "summary-json", value_name = "PATH")]
    pub summary_json: Option<PathBuf>,

    /// Append pipeline events (cleaned, persisted, failures) to this file.
    #[arg(long = "events-log", value_name = "PATH")]
    pub events_log: Option<PathBuf>,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
