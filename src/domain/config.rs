//! Run configuration as understood by the pipeline stages.

use std::path::{Path, PathBuf};

use crate::domain::Metric;

pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/";

pub const COMBINED_FILE_NAME: &str = "covid19_combined_global.csv";
pub const DATABASE_FILE_NAME: &str = "covid19_database.db";
pub const POWERBI_FILE_NAME: &str = "covid19_powerbi_ready.csv";

/// A full run's configuration.
///
/// This is derived from CLI flags (plus defaults and `.env`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub charts_dir: PathBuf,
    pub powerbi_dir: PathBuf,

    /// Base URL the three time-series files are fetched from.
    pub source_url: String,
    /// Read the time-series files from this directory instead of HTTP.
    pub source_dir: Option<PathBuf>,
    /// Skip fetching and go straight to the synthetic dataset.
    pub offline: bool,
    pub http_timeout_secs: u64,

    pub seed: u64,
    pub top_n: usize,
    pub export_insights: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            charts_dir: PathBuf::from("outputs/charts"),
            powerbi_dir: PathBuf::from("powerbi"),
            source_url: DEFAULT_SOURCE_URL.to_string(),
            source_dir: None,
            offline: false,
            http_timeout_secs: 30,
            seed: 42,
            top_n: 10,
            export_insights: None,
        }
    }
}

impl PipelineConfig {
    /// Config rooted at `root`: every output directory lives under it.
    pub fn rooted_at(root: &Path) -> Self {
        Self {
            data_dir: root.join("data"),
            charts_dir: root.join("outputs").join("charts"),
            powerbi_dir: root.join("powerbi"),
            ..Self::default()
        }
    }

    pub fn raw_path(&self, metric: Metric) -> PathBuf {
        self.data_dir.join(metric.local_file_name())
    }

    pub fn combined_path(&self) -> PathBuf {
        self.data_dir.join(COMBINED_FILE_NAME)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }

    pub fn powerbi_path(&self) -> PathBuf {
        self.powerbi_dir.join(POWERBI_FILE_NAME)
    }
}
