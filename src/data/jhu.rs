//! Retrieval of the three JHU CSSE global time-series files.
//!
//! A `SeriesSource` hands back the raw CSV text for one metric. The HTTP
//! source talks to the upstream repository; the directory source reads the
//! same file names from disk (mirrors, fixtures, air-gapped runs).

use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;

use crate::domain::{Metric, PipelineConfig};
use crate::error::AppError;

/// Environment variable overriding the upstream base URL (also read from `.env`).
pub const SOURCE_URL_ENV: &str = "COVID_SOURCE_URL";

/// Where the raw time-series text comes from.
pub trait SeriesSource {
    /// Short human-readable description for log lines.
    fn describe(&self) -> String;

    /// Fetch the raw CSV text for one metric.
    fn fetch(&self, metric: Metric) -> Result<String, AppError>;
}

/// Fetch all three metrics, failing on the first unavailable one.
pub fn fetch_all(source: &dyn SeriesSource) -> Result<Vec<(Metric, String)>, AppError> {
    let mut out = Vec::with_capacity(Metric::ALL.len());
    for metric in Metric::ALL {
        info!("Downloading {metric} data from {}", source.describe());
        let body = source.fetch(metric)?;
        debug!("{metric}: {} bytes", body.len());
        out.push((metric, body));
    }
    Ok(out)
}

/// Build the source selected by the config.
pub fn source_from_config(config: &PipelineConfig) -> Result<Box<dyn SeriesSource>, AppError> {
    match &config.source_dir {
        Some(dir) => Ok(Box::new(DirSource::new(dir.clone()))),
        None => Ok(Box::new(HttpSource::new(
            &config.source_url,
            Duration::from_secs(config.http_timeout_secs),
        )?)),
    }
}

/// Resolve the upstream base URL: explicit flag, then environment, then default.
pub fn resolve_source_url(flag: Option<String>, default: &str) -> String {
    if let Some(url) = flag {
        return url;
    }
    dotenvy::dotenv().ok();
    std::env::var(SOURCE_URL_ENV).unwrap_or_else(|_| default.to_string())
}

pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::new(2, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.to_string(),
        })
    }

    fn url_for(&self, metric: Metric) -> String {
        join_url(&self.base_url, metric.remote_file_name())
    }
}

impl SeriesSource for HttpSource {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    fn fetch(&self, metric: Metric) -> Result<String, AppError> {
        let url = self.url_for(metric);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| AppError::new(4, format!("Request for {metric} series failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::new(
                4,
                format!("Request for {metric} series failed with status {}.", resp.status()),
            ));
        }

        resp.text()
            .map_err(|e| AppError::new(4, format!("Failed to read {metric} response body: {e}")))
    }
}

/// Reads `<dir>/<upstream file name>` for each metric.
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl SeriesSource for DirSource {
    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn fetch(&self, metric: Metric) -> Result<String, AppError> {
        let path = self.dir.join(metric.remote_file_name());
        std::fs::read_to_string(&path).map_err(|e| {
            AppError::new(
                4,
                format!("Failed to read {metric} series '{}': {e}", path.display()),
            )
        })
    }
}

fn join_url(base: &str, file: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{file}")
    } else {
        format!("{base}/{file}")
    }
}
