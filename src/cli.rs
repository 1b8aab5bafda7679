//! Command-line argument parsing for rowset.
//!
//! Uses clap to parse CLI arguments.

use clap::Parser;
use std::path::PathBuf;

/// Output format for script results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text tables.
    #[default]
    Text,
    /// One JSON document covering every step.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!(
                "Invalid output format: {s}. Expected: text or json"
            )),
        }
    }
}

/// Runs a script of prepared statements against an in-memory server.
#[derive(Parser, Debug)]
#[command(name = "rowset")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML script to run
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Fetch rows in chunks of this size instead of all at once
    #[arg(short = 'b', long, value_name = "ROWS")]
    pub batch_size: Option<usize>,

    /// Output format (text or json)
    #[arg(short = 'f', long, value_name = "FORMAT", default_value = "text")]
    pub format: OutputFormat,

    /// Write logs to the log file instead of stderr
    #[arg(long)]
    pub log_file: bool,

    /// Print the column info of each result before its rows
    #[arg(long)]
    pub columns: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(crate::config::Config::default_path)
    }
}
