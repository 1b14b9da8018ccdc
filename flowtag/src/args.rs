use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// TOML configuration file, replaces the run options when given
    #[clap(long, global = true)]
    pub config_file: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Tag flow log records and write the count report
    Run {
        #[clap(flatten)]
        config: RunConfig,

        #[clap(flatten)]
        output: OutputConfig,
    },

    /// Print the protocol number table in use
    Protocols {
        /// IANA style protocol numbers CSV (default: built-in table)
        #[clap(long)]
        protocols: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Path to the lookup table CSV (dstport,protocol,tag)
    #[clap(long, default_value = "input_files/lookup_table.csv")]
    pub lookup_table: PathBuf,

    /// Path to the flow log file
    #[clap(long, default_value = "input_files/flow_logs.txt")]
    pub flow_logs: PathBuf,

    /// IANA style protocol numbers CSV (default: built-in table)
    #[clap(long)]
    pub protocols: Option<PathBuf>,

    /// Validate every field of each flow log line, not only port and protocol
    #[clap(long, action = clap::ArgAction::SetTrue)]
    pub strict: bool,

    /// Read every lookup row as data, even a first row that looks like a header
    #[clap(long, action = clap::ArgAction::SetTrue)]
    pub no_lookup_header: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            lookup_table: PathBuf::from("input_files/lookup_table.csv"),
            flow_logs: PathBuf::from("input_files/flow_logs.txt"),
            protocols: None,
            strict: false,
            no_lookup_header: false,
        }
    }
}

#[derive(Args, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output method
    #[clap(short, long, value_enum, default_value_t = ExportMethodType::Csv)]
    pub output: ExportMethodType,

    /// File path for output (used if method is Csv, default: timestamped name)
    #[clap(long)]
    pub export_path: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportMethodType {
    /// The report will be printed to the console
    Print,

    /// The report will be written to a CSV file
    #[default]
    Csv,
}

/// Contents of a `--config-file`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub config: RunConfig,
    pub output: OutputConfig,
}
