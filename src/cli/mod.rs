//! Command-line parsing for the COVID-19 data pipeline.
//!
//! Argument parsing and command dispatch stay separate from the stage code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "covid", version, about = "COVID-19 time-series ETL pipeline (JHU CSSE)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run download, analyze and sql in order and print a summary.
    Run(PipelineArgs),
    /// Fetch the three time series, combine them, and write the combined and Power-BI CSVs.
    ///
    /// Falls back to a synthetic dataset when the source cannot be reached.
    Download(PipelineArgs),
    /// Print the dataset summary and insights, and render charts.
    Analyze(PipelineArgs),
    /// Load the combined table into SQLite and print the example queries.
    Sql(PipelineArgs),
}

/// Options shared by every stage. All have defaults.
#[derive(Debug, Args, Clone)]
pub struct PipelineArgs {
    /// Directory for raw series, the combined CSV and the database.
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Directory the charts are written to.
    #[arg(long, default_value = "outputs/charts")]
    pub charts_dir: PathBuf,

    /// Directory for the Power-BI ready CSV.
    #[arg(long, default_value = "powerbi")]
    pub powerbi_dir: PathBuf,

    /// Base URL of the time-series files (else $COVID_SOURCE_URL, else the JHU repository).
    #[arg(long)]
    pub source_url: Option<String>,

    /// Read the time-series files from a local directory instead of HTTP.
    #[arg(long, value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Skip the download and use the synthetic dataset.
    #[arg(long)]
    pub offline: bool,

    /// HTTP timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub http_timeout: u64,

    /// Random seed for the synthetic dataset.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of regions in the top-N charts and queries.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export the insights to JSON.
    #[arg(long, value_name = "JSON")]
    pub export_insights: Option<PathBuf>,
}
