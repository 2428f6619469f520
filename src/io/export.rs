//! Combined-table CSV exports and reload.
//!
//! The combined CSV is the hand-off between stages: the download stage writes
//! it, the analysis and SQL stages read it back. The Power-BI export is the
//! same schema under a different name and directory.

use std::fs::{self, File};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{EntityId, MergedRow};
use crate::error::AppError;

/// Flat CSV representation of a `MergedRow`, column names as published.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CombinedRecord {
    #[serde(rename = "Province/State")]
    province: Option<String>,
    #[serde(rename = "Country/Region")]
    region: String,
    #[serde(rename = "Lat")]
    lat: Option<f64>,
    #[serde(rename = "Long")]
    long: Option<f64>,
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Confirmed")]
    confirmed: i64,
    #[serde(rename = "Deaths")]
    deaths: i64,
    #[serde(rename = "Recovered")]
    recovered: i64,
    #[serde(rename = "Active")]
    active: i64,
    #[serde(rename = "New_Confirmed")]
    new_confirmed: i64,
    #[serde(rename = "New_Deaths")]
    new_deaths: i64,
    #[serde(rename = "New_Recovered")]
    new_recovered: i64,
    #[serde(rename = "Mortality_Rate")]
    mortality_rate: f64,
    #[serde(rename = "Recovery_Rate")]
    recovery_rate: f64,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Month")]
    month: u32,
    #[serde(rename = "DayOfWeek")]
    day_of_week: String,
}

impl From<&MergedRow> for CombinedRecord {
    fn from(r: &MergedRow) -> Self {
        Self {
            province: r.entity.province.clone(),
            region: r.entity.region.clone(),
            lat: r.entity.lat,
            long: r.entity.long,
            date: r.date,
            confirmed: r.confirmed,
            deaths: r.deaths,
            recovered: r.recovered,
            active: r.active,
            new_confirmed: r.new_confirmed,
            new_deaths: r.new_deaths,
            new_recovered: r.new_recovered,
            mortality_rate: r.mortality_rate,
            recovery_rate: r.recovery_rate,
            year: r.year,
            month: r.month,
            day_of_week: r.day_of_week.clone(),
        }
    }
}

impl From<CombinedRecord> for MergedRow {
    fn from(r: CombinedRecord) -> Self {
        Self {
            entity: EntityId::new(r.province.filter(|p| !p.is_empty()), r.region, r.lat, r.long),
            date: r.date,
            confirmed: r.confirmed,
            deaths: r.deaths,
            recovered: r.recovered,
            active: r.active,
            new_confirmed: r.new_confirmed,
            new_deaths: r.new_deaths,
            new_recovered: r.new_recovered,
            mortality_rate: r.mortality_rate,
            recovery_rate: r.recovery_rate,
            year: r.year,
            month: r.month,
            day_of_week: r.day_of_week,
            // Deltas are already derived when the table is written.
            confirmed_reported: true,
        }
    }
}

/// Write the combined table to CSV, creating parent directories.
pub fn write_combined_csv(path: &Path, rows: &[MergedRow]) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }

    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);

    for row in rows {
        writer
            .serialize(CombinedRecord::from(row))
            .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV '{}': {e}", path.display())))?;

    Ok(())
}

/// Write the Power-BI ready copy of the combined table.
pub fn write_powerbi_csv(path: &Path, rows: &[MergedRow]) -> Result<(), AppError> {
    write_combined_csv(path, rows)
}

/// Reload a combined CSV written by `write_combined_csv`.
pub fn read_combined_csv(path: &Path) -> Result<Vec<MergedRow>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            4,
            format!(
                "Combined data file '{}' not found ({e}). Run `covid download` first.",
                path.display()
            ),
        )
    })?;

    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);
    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<CombinedRecord>().enumerate() {
        let record = result
            .map_err(|e| AppError::new(3, format!("Combined CSV line {}: {e}", idx + 2)))?;
        rows.push(MergedRow::from(record));
    }

    if rows.is_empty() {
        return Err(AppError::new(
            3,
            format!("Combined data file '{}' has no rows.", path.display()),
        ));
    }
    Ok(rows)
}
