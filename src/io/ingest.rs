//! Wide time-series CSV ingest.
//!
//! Turns an upstream file (one row per entity, one column per date) into a
//! `WideTable`. The identity columns are required; every other header must be
//! a date. Any cell that cannot be interpreted fails the whole table with
//! exit code 3 so the caller can report the stage as failed.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::StringRecord;
use log::{debug, warn};

use crate::domain::{EntityId, Metric, RawSeriesRow, WideTable};
use crate::error::AppError;

pub const COL_PROVINCE: &str = "Province/State";
pub const COL_REGION: &str = "Country/Region";
pub const COL_LAT: &str = "Lat";
pub const COL_LONG: &str = "Long";

const IDENTITY_COLUMNS: [&str; 4] = [COL_PROVINCE, COL_REGION, COL_LAT, COL_LONG];

/// Header date formats, tried in order. `%y` must come before `%Y`, otherwise
/// `1/22/20` would be read as the year 20.
const DATE_FORMATS: [&str; 3] = ["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"];

/// Open and parse a wide CSV from disk.
pub fn read_wide_csv(path: &Path, metric: Metric) -> Result<WideTable, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            4,
            format!("Failed to open {metric} series '{}': {e}", path.display()),
        )
    })?;
    parse_wide_csv(file, metric)
}

/// Parse a wide CSV from any reader.
pub fn parse_wide_csv<R: Read>(reader: R, metric: Metric) -> Result<WideTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(3, format!("Failed to read {metric} CSV headers: {e}")))?
        .clone();

    let layout = HeaderLayout::from_headers(&headers, metric)?;

    let mut rows = Vec::new();
    let mut negative_cells = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: 1-based lines, plus the header line.
        let line = idx + 2;
        let record =
            result.map_err(|e| AppError::new(3, format!("{metric} CSV parse error on line {line}: {e}")))?;

        if record.len() != headers.len() {
            return Err(AppError::new(
                3,
                format!(
                    "{metric} CSV line {line} has {} fields, expected {}.",
                    record.len(),
                    headers.len()
                ),
            ));
        }

        let entity = layout
            .entity(&record)
            .map_err(|e| AppError::new(3, format!("{metric} CSV line {line}: {e}")))?;

        let mut values = Vec::with_capacity(layout.date_columns.len());
        for &(col, date) in &layout.date_columns {
            let raw = record.get(col).unwrap_or("");
            let value = parse_count(raw).map_err(|e| {
                AppError::new(3, format!("{metric} CSV line {line}, date {date}: {e}"))
            })?;
            values.push(match value {
                Some(v) if v < 0 => {
                    negative_cells += 1;
                    None
                }
                other => other,
            });
        }

        rows.push(RawSeriesRow { entity, values });
    }

    if rows.is_empty() {
        return Err(AppError::new(3, format!("{metric} CSV contains no entity rows.")));
    }
    if negative_cells > 0 {
        warn!("{metric}: {negative_cells} negative cumulative counts treated as missing");
    }
    debug!(
        "{metric}: parsed {} entities x {} dates",
        rows.len(),
        layout.date_columns.len()
    );

    Ok(WideTable {
        metric,
        dates: layout.date_columns.iter().map(|&(_, d)| d).collect(),
        rows,
    })
}

/// Resolved column positions for one file.
struct HeaderLayout {
    province: usize,
    region: usize,
    lat: usize,
    long: usize,
    date_columns: Vec<(usize, NaiveDate)>,
}

impl HeaderLayout {
    fn from_headers(headers: &StringRecord, metric: Metric) -> Result<Self, AppError> {
        let header_map: HashMap<String, usize> = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| (normalize_header_name(name), idx))
            .collect();

        let find = |name: &str| -> Result<usize, AppError> {
            header_map
                .get(&normalize_header_name(name))
                .copied()
                .ok_or_else(|| AppError::new(3, format!("{metric} CSV is missing required column `{name}`.")))
        };

        let province = find(COL_PROVINCE)?;
        let region = find(COL_REGION)?;
        let lat = find(COL_LAT)?;
        let long = find(COL_LONG)?;
        let identity = [province, region, lat, long];

        let mut date_columns = Vec::new();
        let mut seen = HashSet::new();
        for (idx, name) in headers.iter().enumerate() {
            if identity.contains(&idx) {
                continue;
            }
            let label = name.trim().trim_start_matches('\u{feff}');
            let date = parse_date_label(label).ok_or_else(|| {
                AppError::new(
                    3,
                    format!("{metric} CSV column `{label}` is neither an identity column nor a date."),
                )
            })?;
            if !seen.insert(date) {
                return Err(AppError::new(3, format!("{metric} CSV has duplicate date column {date}.")));
            }
            date_columns.push((idx, date));
        }

        if date_columns.is_empty() {
            return Err(AppError::new(
                3,
                format!(
                    "{metric} CSV has no date columns (expected headers after {}).",
                    IDENTITY_COLUMNS.join(", ")
                ),
            ));
        }

        Ok(Self {
            province,
            region,
            lat,
            long,
            date_columns,
        })
    }

    fn entity(&self, record: &StringRecord) -> Result<EntityId, String> {
        let province = record
            .get(self.province)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let region = record.get(self.region).map(str::trim).unwrap_or("");
        if region.is_empty() {
            return Err(format!("empty `{COL_REGION}`"));
        }
        let lat = parse_coord(record.get(self.lat).unwrap_or(""))
            .map_err(|e| format!("`{COL_LAT}`: {e}"))?;
        let long = parse_coord(record.get(self.long).unwrap_or(""))
            .map_err(|e| format!("`{COL_LONG}`: {e}"))?;
        Ok(EntityId::new(province, region, lat, long))
    }
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. Strip it before matching.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Parse a date column label such as `1/22/20`.
pub fn parse_date_label(label: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(label, fmt).ok())
}

fn is_missing(raw: &str) -> bool {
    raw.is_empty() || raw.eq_ignore_ascii_case("nan")
}

/// Floats at or beyond 2^63 do not fit an `i64` count.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Parse a cumulative count cell. Empty and `NaN` are missing.
fn parse_count(raw: &str) -> Result<Option<i64>, String> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return Ok(None);
    }
    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(Some(v));
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < I64_LIMIT => Ok(Some(v as i64)),
        _ => Err(format!("invalid count '{trimmed}'")),
    }
}

fn parse_coord(raw: &str) -> Result<Option<f64>, String> {
    let trimmed = raw.trim();
    if is_missing(trimmed) {
        return Ok(None);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(format!("invalid coordinate '{trimmed}'")),
    }
}
