//! Reporting utilities: aggregate statistics, rankings, and insight exports.
//!
//! Everything here is a pure function of the combined rows. The "latest date"
//! is recomputed from the rows on every call rather than cached.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use crate::domain::{COMBINED_COLUMNS, MergedRow, Metric, rate_pct};
use crate::error::AppError;

pub mod format;

pub use format::*;

/// Shape of the loaded dataset (printed before analysis).
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub regions: usize,
}

/// Summed cumulative counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub active: i64,
}

impl Totals {
    fn add(&mut self, row: &MergedRow) {
        self.confirmed += row.confirmed;
        self.deaths += row.deaths;
        self.recovered += row.recovered;
        self.active += row.active;
    }

    pub fn count(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Confirmed => self.confirmed,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
    }

    pub fn mortality_rate(&self) -> f64 {
        rate_pct(self.deaths, self.confirmed)
    }

    pub fn recovery_rate(&self) -> f64 {
        rate_pct(self.recovered, self.confirmed)
    }
}

/// Global totals for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub totals: Totals,
}

/// Totals for one `Country/Region` on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionTotals {
    pub region: String,
    #[serde(flatten)]
    pub totals: Totals,
    pub mortality_rate: f64,
    pub recovery_rate: f64,
}

impl RegionTotals {
    fn new(region: String, totals: Totals) -> Self {
        Self {
            region,
            mortality_rate: totals.mortality_rate(),
            recovery_rate: totals.recovery_rate(),
            totals,
        }
    }
}

/// Headline numbers printed by the analysis stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub latest_date: NaiveDate,
    pub totals: Totals,
    pub mortality_rate: f64,
    pub recovery_rate: f64,
    pub top_confirmed: Vec<RegionTotals>,
    pub top_deaths: Vec<RegionTotals>,
}

pub fn summarize(rows: &[MergedRow]) -> Option<DatasetSummary> {
    let first_date = rows.iter().map(|r| r.date).min()?;
    let last_date = latest_date(rows)?;
    let regions: BTreeSet<&str> = rows.iter().map(|r| r.entity.region.as_str()).collect();
    Some(DatasetSummary {
        rows: rows.len(),
        columns: COMBINED_COLUMNS.len(),
        first_date,
        last_date,
        regions: regions.len(),
    })
}

/// Most recent date present in the rows.
pub fn latest_date(rows: &[MergedRow]) -> Option<NaiveDate> {
    rows.iter().map(|r| r.date).max()
}

/// Global totals per date, ascending.
pub fn global_daily(rows: &[MergedRow]) -> Vec<DailyTotals> {
    let mut by_date: BTreeMap<NaiveDate, Totals> = BTreeMap::new();
    for r in rows {
        by_date.entry(r.date).or_default().add(r);
    }
    by_date
        .into_iter()
        .map(|(date, totals)| DailyTotals { date, totals })
        .collect()
}

/// Per-region totals on `date`, ordered by region label.
pub fn region_totals_on(rows: &[MergedRow], date: NaiveDate) -> Vec<RegionTotals> {
    let mut by_region: BTreeMap<&str, Totals> = BTreeMap::new();
    for r in rows.iter().filter(|r| r.date == date) {
        by_region.entry(r.entity.region.as_str()).or_default().add(r);
    }
    by_region
        .into_iter()
        .map(|(region, totals)| RegionTotals::new(region.to_string(), totals))
        .collect()
}

/// Top `n` regions by `metric`, descending. Exact ties are broken by region label.
pub fn top_regions(totals: &[RegionTotals], metric: Metric, n: usize) -> Vec<RegionTotals> {
    let mut sorted = totals.to_vec();
    sorted.sort_by(|a, b| {
        b.totals
            .count(metric)
            .cmp(&a.totals.count(metric))
            .then_with(|| a.region.cmp(&b.region))
    });
    sorted.truncate(n);
    sorted
}

/// Top `n` individual entities by `metric` on `date`, descending.
/// Exact ties are broken by entity identity order.
pub fn top_entities(rows: &[MergedRow], date: NaiveDate, metric: Metric, n: usize) -> Vec<&MergedRow> {
    let mut on_date: Vec<&MergedRow> = rows.iter().filter(|r| r.date == date).collect();
    on_date.sort_by(|a, b| {
        b.count(metric)
            .cmp(&a.count(metric))
            .then_with(|| a.entity.cmp(&b.entity))
    });
    on_date.truncate(n);
    on_date
}

/// Compute the headline insights on the latest date.
pub fn compute_insights(rows: &[MergedRow], top_n: usize) -> Result<Insights, AppError> {
    let latest = latest_date(rows).ok_or_else(|| AppError::new(3, "No rows to analyze."))?;
    let regions = region_totals_on(rows, latest);

    let mut totals = Totals::default();
    for r in rows.iter().filter(|r| r.date == latest) {
        totals.add(r);
    }

    Ok(Insights {
        latest_date: latest,
        totals,
        mortality_rate: totals.mortality_rate(),
        recovery_rate: totals.recovery_rate(),
        top_confirmed: top_regions(&regions, Metric::Confirmed, top_n),
        top_deaths: top_regions(&regions, Metric::Deaths, top_n),
    })
}

/// Write insights as pretty JSON.
pub fn write_insights_json(path: &Path, insights: &Insights) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create insights JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, insights)
        .map_err(|e| AppError::new(2, format!("Failed to write insights JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EntityId;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, day).unwrap()
    }

    fn row(province: Option<&str>, region: &str, date: NaiveDate, c: i64, de: i64, r: i64) -> MergedRow {
        MergedRow::from_counts(
            EntityId::new(province.map(str::to_string), region, Some(0.0), Some(0.0)),
            date,
            c,
            de,
            r,
        )
    }

    fn fixture() -> Vec<MergedRow> {
        vec![
            row(None, "Chile", d(1), 50, 1, 10),
            row(None, "Chile", d(2), 70, 2, 20),
            row(Some("Ontario"), "Canada", d(2), 40, 2, 5),
            row(Some("Quebec"), "Canada", d(2), 30, 3, 5),
            row(None, "Brazil", d(2), 70, 7, 50),
            row(None, "Aruba", d(2), 0, 0, 0),
        ]
    }

    #[test]
    fn latest_date_is_max() {
        assert_eq!(latest_date(&fixture()), Some(d(2)));
        assert_eq!(latest_date(&[]), None);
    }

    #[test]
    fn summary_counts_regions() {
        let s = summarize(&fixture()).unwrap();
        assert_eq!(s.rows, 6);
        assert_eq!(s.columns, 17);
        assert_eq!((s.first_date, s.last_date), (d(1), d(2)));
        assert_eq!(s.regions, 4);
    }

    #[test]
    fn region_totals_sum_provinces() {
        let totals = region_totals_on(&fixture(), d(2));
        let canada = totals.iter().find(|t| t.region == "Canada").unwrap();
        assert_eq!(canada.totals.confirmed, 70);
        assert_eq!(canada.totals.deaths, 5);
        let aruba = totals.iter().find(|t| t.region == "Aruba").unwrap();
        assert_eq!(aruba.mortality_rate, 0.0);
    }

    #[test]
    fn ranking_is_descending_with_deterministic_ties() {
        let totals = region_totals_on(&fixture(), d(2));
        let top = top_regions(&totals, Metric::Confirmed, 3);
        let names: Vec<&str> = top.iter().map(|t| t.region.as_str()).collect();
        // Brazil, Canada and Chile all have 70; ties go alphabetical.
        assert_eq!(names, vec!["Brazil", "Canada", "Chile"]);

        // Input order does not matter.
        let mut reversed = totals.clone();
        reversed.reverse();
        assert_eq!(top_regions(&reversed, Metric::Confirmed, 3), top);
    }

    #[test]
    fn entity_ranking_breaks_ties_by_identity() {
        let rows = fixture();
        let top = top_entities(&rows, d(2), Metric::Confirmed, 2);
        assert_eq!(top[0].entity.region, "Brazil");
        assert_eq!(top[1].entity.region, "Chile");
    }

    #[test]
    fn insights_use_latest_date_only() {
        let insights = compute_insights(&fixture(), 2).unwrap();
        assert_eq!(insights.latest_date, d(2));
        assert_eq!(insights.totals.confirmed, 210);
        assert_eq!(insights.totals.deaths, 14);
        assert!((insights.mortality_rate - 14.0 / 210.0 * 100.0).abs() < 1e-9);
        assert_eq!(insights.top_deaths[0].region, "Brazil");
        assert_eq!(insights.top_confirmed.len(), 2);
    }

    #[test]
    fn global_daily_is_ascending() {
        let daily = global_daily(&fixture());
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].totals.confirmed, 50);
        assert_eq!(daily[1].totals.active, 70 - 2 - 20 + 40 - 2 - 5 + 30 - 3 - 5 + 70 - 7 - 50);
    }

    #[test]
    fn insights_json_roundtrips_through_serde() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insights.json");
        write_insights_json(&path, &compute_insights(&fixture(), 1).unwrap()).unwrap();
        let value: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value["latest_date"], "2022-01-02");
        assert_eq!(value["top_confirmed"][0]["region"], "Brazil");
        assert_eq!(value["top_confirmed"][0]["confirmed"], 70);
    }
}
