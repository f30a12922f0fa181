//! CLI argument definitions for `track-veil`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "track-veil",
    version,
    about = "Anonymize team and run identifiers in evaluation campaign data",
    long_about = "Replace team and run identifiers with stable pseudonyms across run files,\n\
                  evaluation score files and run metadata.\n\n\
                  Mappings are kept in a SQLite database so later runs stay consistent\n\
                  and anonymized values can be traced back to their originals."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Include original identifiers in log output.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Anonymize a dataset directory into an output directory.
    Anonymize(AnonymizeArgs),

    /// Show stored team and run mappings.
    ShowMapping(ShowMappingArgs),

    /// Find the original value behind an anonymized identifier or fingerprint.
    ReverseLookup(ReverseLookupArgs),
}

#[derive(Parser)]
pub struct AnonymizeArgs {
    /// Input directory containing the runs, eval and metadata subdirectories.
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory for anonymized data.
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    pub output: PathBuf,

    /// SQLite database holding the mappings.
    #[arg(short = 'm', long = "mapping", value_name = "FILE", default_value = "mapping.db")]
    pub mapping: PathBuf,

    /// Name of the runs subdirectory.
    #[arg(long = "runs-dir", default_value = "runs")]
    pub runs_dir: String,

    /// Name of the evaluation subdirectory.
    #[arg(long = "eval-dir", default_value = "eval")]
    pub eval_dir: String,

    /// Name of the metadata subdirectory.
    #[arg(long = "metadata-dir", default_value = "metadata")]
    pub metadata_dir: String,

    /// Never prompt; record problems as issues instead.
    #[arg(long = "no-interactive")]
    pub no_interactive: bool,

    /// Show what would be done without writing files or creating mappings.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Where to write the issue report (default: <OUTPUT>/errors.jsonl).
    #[arg(long = "error-report", value_name = "FILE")]
    pub error_report: Option<PathBuf>,

    /// Only process runs whose metadata `std-priority` equals this value.
    #[arg(short = 'p', long = "priority", value_name = "PRIORITY")]
    pub priority: Option<String>,

    /// Seed for a new mapping database (must match an existing one).
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// TOML file with format overrides and per-task judge suffixes.
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Exit successfully even when error-class issues were recorded.
    #[arg(long = "allow-errors")]
    pub allow_errors: bool,
}

#[derive(Parser)]
pub struct ShowMappingArgs {
    /// SQLite database holding the mappings.
    #[arg(short = 'm', long = "mapping", value_name = "FILE")]
    pub mapping: PathBuf,

    /// Output format.
    #[arg(short = 'f', long = "format", value_enum, default_value = "table")]
    pub format: MappingFormatArg,
}

#[derive(Parser)]
pub struct ReverseLookupArgs {
    /// SQLite database holding the mappings.
    #[arg(short = 'm', long = "mapping", value_name = "FILE")]
    pub mapping: PathBuf,

    /// Anonymized team, run, `team-run` pair or 64-character fingerprint.
    #[arg(value_name = "VALUE")]
    pub value: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MappingFormatArg {
    Table,
    Json,
    Csv,
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
