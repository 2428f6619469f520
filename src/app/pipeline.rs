//! The three pipeline stages and the orchestrator that runs them in order.
//!
//! download: fetch -> save raw -> ingest -> combine -> write combined + Power-BI copy
//! analyze:  reload combined -> summary -> charts -> insights
//! sql:      reload combined -> load into SQLite -> illustrative queries
//!
//! Stage functions return `Result`; only `run_all` turns failures into flags.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use log::{error, info, warn};

use crate::data::{SeriesSource, fetch_all, generate_sample, source_from_config};
use crate::domain::{MergedRow, Metric, PipelineConfig};
use crate::error::AppError;
use crate::io::{read_combined_csv, read_wide_csv, write_combined_csv, write_powerbi_csv};
use crate::report::{Insights, compute_insights, format_dataset_summary, format_insights, format_query_report, summarize};
use crate::store::{QueryReport, load_rows, run_queries};
use crate::transform::combine_wide;

/// Regions listed in each insights ranking.
const INSIGHT_TOP: usize = 5;

/// Where the download stage's rows came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Downloaded,
    SampleGenerated,
}

#[derive(Debug, Clone)]
pub struct DownloadOutput {
    pub origin: DataOrigin,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct AnalyzeOutput {
    pub insights: Insights,
    pub charts: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SqlOutput {
    pub loaded: usize,
    pub report: QueryReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Analyze,
    Sql,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Download, Stage::Analyze, Stage::Sql];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Download => "Data Download & Processing",
            Stage::Analyze => "Data Analysis & Visualization",
            Stage::Sql => "SQL Database Setup",
        };
        f.write_str(name)
    }
}

/// Pass/fail per stage, in run order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub results: Vec<(Stage, bool)>,
}

impl RunSummary {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|(_, ok)| *ok).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.passed()
    }

    pub fn all_passed(&self) -> bool {
        self.failed() == 0
    }
}

/// Download stage using the source selected by the config.
pub fn stage_download(config: &PipelineConfig) -> Result<DownloadOutput, AppError> {
    if config.offline {
        info!("Offline mode: skipping download.");
        return write_sample(config);
    }
    let source = source_from_config(config)?;
    stage_download_from(config, source.as_ref())
}

/// Download stage against an explicit source.
///
/// Any fetch failure falls back to the synthetic dataset. Failures after a
/// successful fetch (bad CSV, disk errors) are returned.
pub fn stage_download_from(config: &PipelineConfig, source: &dyn SeriesSource) -> Result<DownloadOutput, AppError> {
    let bodies = match fetch_all(source) {
        Ok(bodies) => bodies,
        Err(e) => {
            warn!("Download failed: {e}");
            warn!("Creating sample dataset for demonstration...");
            return write_sample(config);
        }
    };

    fs::create_dir_all(&config.data_dir).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create data directory '{}': {e}", config.data_dir.display()),
        )
    })?;
    for (metric, body) in &bodies {
        let path = config.raw_path(*metric);
        fs::write(&path, body)
            .map_err(|e| AppError::new(2, format!("Failed to save '{}': {e}", path.display())))?;
        info!("Saved {metric} data to {}", path.display());
    }

    let confirmed = read_wide_csv(&config.raw_path(Metric::Confirmed), Metric::Confirmed)?;
    let deaths = read_wide_csv(&config.raw_path(Metric::Deaths), Metric::Deaths)?;
    let recovered = read_wide_csv(&config.raw_path(Metric::Recovered), Metric::Recovered)?;
    let rows = combine_wide(&confirmed, &deaths, &recovered)?;

    write_outputs(config, &rows)?;
    Ok(DownloadOutput {
        origin: DataOrigin::Downloaded,
        rows: rows.len(),
    })
}

fn write_sample(config: &PipelineConfig) -> Result<DownloadOutput, AppError> {
    let rows = generate_sample(config.seed)?;
    write_outputs(config, &rows)?;
    Ok(DownloadOutput {
        origin: DataOrigin::SampleGenerated,
        rows: rows.len(),
    })
}

fn write_outputs(config: &PipelineConfig, rows: &[MergedRow]) -> Result<(), AppError> {
    let combined = config.combined_path();
    write_combined_csv(&combined, rows)?;
    info!("Combined data saved: {} ({} rows)", combined.display(), rows.len());

    let powerbi = config.powerbi_path();
    write_powerbi_csv(&powerbi, rows)?;
    info!("Power-BI data saved: {}", powerbi.display());
    Ok(())
}

/// Analysis stage: summary, charts, insights.
pub fn stage_analyze(config: &PipelineConfig) -> Result<AnalyzeOutput, AppError> {
    let rows = read_combined_csv(&config.combined_path())?;

    if let Some(summary) = summarize(&rows) {
        print!("{}", format_dataset_summary(&summary));
    }

    let charts = crate::plot::render_all(&rows, &config.charts_dir, config.top_n)?;

    let insights = compute_insights(&rows, INSIGHT_TOP)?;
    print!("{}", format_insights(&insights));

    if let Some(path) = &config.export_insights {
        crate::report::write_insights_json(path, &insights)?;
        info!("Insights exported: {}", path.display());
    }

    Ok(AnalyzeOutput { insights, charts })
}

/// SQL stage: load the combined table into SQLite and run the example queries.
pub fn stage_sql(config: &PipelineConfig) -> Result<SqlOutput, AppError> {
    let rows = read_combined_csv(&config.combined_path())?;

    let db = config.database_path();
    let loaded = load_rows(&db, &rows)?;
    info!("Database created: {} ({loaded} records)", db.display());

    let report = run_queries(&db, config.top_n)?;
    print!("{}", format_query_report(&report));

    Ok(SqlOutput { loaded, report })
}

/// Run every stage in order; a failing stage is logged and the run continues.
pub fn run_all(config: &PipelineConfig) -> RunSummary {
    let mut summary = RunSummary::default();

    for stage in Stage::ALL {
        info!("Running: {stage}");
        let outcome = match stage {
            Stage::Download => stage_download(config).map(|_| ()),
            Stage::Analyze => stage_analyze(config).map(|_| ()),
            Stage::Sql => stage_sql(config).map(|_| ()),
        };
        match outcome {
            Ok(()) => {
                info!("{stage} completed successfully");
                summary.results.push((stage, true));
            }
            Err(e) => {
                error!("{stage} failed: {e}");
                summary.results.push((stage, false));
            }
        }
    }

    summary
}

/// Closing text printed after `run_all`.
pub fn format_run_summary(summary: &RunSummary, config: &PipelineConfig) -> String {
    let rule = "=".repeat(60);
    let mut out = format!("{rule}\nPIPELINE SUMMARY\n{rule}\n");
    out.push_str(&format!(
        "Successful: {}/{} stages\n",
        summary.passed(),
        summary.results.len()
    ));

    if summary.all_passed() {
        out.push_str("All stages completed successfully.\n");
        out.push_str("Outputs:\n");
        out.push_str(&format!("  Charts: {}\n", config.charts_dir.display()));
        out.push_str(&format!("  Data and database: {}\n", config.data_dir.display()));
        out.push_str(&format!("  Power-BI file: {}\n", config.powerbi_path().display()));
        out.push_str("Next: load the Power-BI file into a dashboard, or query the database directly.\n");
    } else {
        out.push_str(&format!("{} stage(s) failed. Check the log above.\n", summary.failed()));
        out.push_str("Try running the stages individually: `covid download`, `covid analyze`, `covid sql`.\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSource;

    impl SeriesSource for FailingSource {
        fn describe(&self) -> String {
            "nowhere".to_string()
        }

        fn fetch(&self, metric: Metric) -> Result<String, AppError> {
            Err(AppError::new(4, format!("{metric} unreachable")))
        }
    }

    struct FixtureSource;

    impl SeriesSource for FixtureSource {
        fn describe(&self) -> String {
            "fixture".to_string()
        }

        fn fetch(&self, metric: Metric) -> Result<String, AppError> {
            let (a, b) = match metric {
                Metric::Confirmed => ("10,15", "1,1"),
                Metric::Deaths => ("1,2", "0,0"),
                Metric::Recovered => ("2,5", "0,1"),
            };
            Ok(format!(
                "Province/State,Country/Region,Lat,Long,1/22/20,1/23/20\n\
                 ,Peru,-9.19,-75.02,{a}\n\
                 ,Chad,15.45,18.73,{b}\n"
            ))
        }
    }

    #[test]
    fn fetch_failure_falls_back_to_sample() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::rooted_at(dir.path());
        let out = stage_download_from(&config, &FailingSource).unwrap();
        assert_eq!(out.origin, DataOrigin::SampleGenerated);
        assert!(out.rows > 0);
        assert!(config.combined_path().exists());
        assert!(config.powerbi_path().exists());
        assert!(!config.raw_path(Metric::Confirmed).exists());
    }

    #[test]
    fn fetched_series_are_saved_and_combined() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::rooted_at(dir.path());
        let out = stage_download_from(&config, &FixtureSource).unwrap();
        assert_eq!(out.origin, DataOrigin::Downloaded);
        assert_eq!(out.rows, 4);
        for metric in Metric::ALL {
            assert!(config.raw_path(metric).exists());
        }

        let rows = read_combined_csv(&config.combined_path()).unwrap();
        let peru: Vec<_> = rows.iter().filter(|r| r.entity.region == "Peru").collect();
        assert_eq!(peru[1].new_confirmed, 5);
        assert_eq!(peru[1].active, 15 - 2 - 5);
    }

    #[test]
    fn analyze_without_download_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::rooted_at(dir.path());
        let err = stage_analyze(&config).unwrap_err();
        assert!(err.is_unavailable());
        assert!(stage_sql(&config).unwrap_err().is_unavailable());
    }

    #[test]
    fn run_all_counts_failures_without_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::rooted_at(dir.path());
        config.offline = true;
        // A file where the charts directory should be makes only analyze fail.
        fs::create_dir_all(dir.path().join("outputs")).unwrap();
        fs::write(&config.charts_dir, "not a directory").unwrap();

        let summary = run_all(&config);
        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.passed(), 2);
        assert_eq!(summary.results[1], (Stage::Analyze, false));
        assert!(config.database_path().exists());

        let text = format_run_summary(&summary, &config);
        assert!(text.contains("Successful: 2/3 stages"));
        assert!(text.contains("1 stage(s) failed"));
    }
}
