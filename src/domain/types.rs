//! Shared domain types.
//!
//! These types are intentionally kept lightweight so they can be:
//!
//! - used in-memory during reshaping and reporting
//! - exported to CSV/SQLite
//! - reloaded later by the analysis and SQL stages

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// One of the three cumulative series published per entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Confirmed,
    Deaths,
    Recovered,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Confirmed, Metric::Deaths, Metric::Recovered];

    /// Column label used in the combined table.
    pub fn column_name(self) -> &'static str {
        match self {
            Metric::Confirmed => "Confirmed",
            Metric::Deaths => "Deaths",
            Metric::Recovered => "Recovered",
        }
    }

    /// Lowercase tag used in log messages and file names.
    pub fn slug(self) -> &'static str {
        match self {
            Metric::Confirmed => "confirmed",
            Metric::Deaths => "deaths",
            Metric::Recovered => "recovered",
        }
    }

    /// File name of the upstream time-series resource.
    pub fn remote_file_name(self) -> &'static str {
        match self {
            Metric::Confirmed => "time_series_covid19_confirmed_global.csv",
            Metric::Deaths => "time_series_covid19_deaths_global.csv",
            Metric::Recovered => "time_series_covid19_recovered_global.csv",
        }
    }

    /// File name of the raw copy kept in the data directory.
    pub fn local_file_name(self) -> String {
        format!("covid19_{}_global.csv", self.slug())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Identity of one reporting unit: `(sub-region, region, lat, long)`.
///
/// Coordinates take part in equality and hashing by bit pattern, and in
/// ordering via `f64::total_cmp`, so the type is a proper join/sort key.
/// Ordering is region first, then sub-region (`None` first), then coordinates.
#[derive(Debug, Clone)]
pub struct EntityId {
    pub province: Option<String>,
    pub region: String,
    pub lat: Option<f64>,
    pub long: Option<f64>,
}

impl EntityId {
    pub fn new(province: Option<String>, region: impl Into<String>, lat: Option<f64>, long: Option<f64>) -> Self {
        Self {
            province,
            region: region.into(),
            lat,
            long,
        }
    }
}

fn cmp_coord(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.total_cmp(&y),
    }
}

impl Ord for EntityId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.region
            .cmp(&other.region)
            .then_with(|| self.province.cmp(&other.province))
            .then_with(|| cmp_coord(self.lat, other.lat))
            .then_with(|| cmp_coord(self.long, other.long))
    }
}

impl PartialOrd for EntityId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for EntityId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EntityId {}

impl Hash for EntityId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.region.hash(state);
        self.province.hash(state);
        self.lat.map(f64::to_bits).hash(state);
        self.long.map(f64::to_bits).hash(state);
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.province {
            Some(p) => write!(f, "{} / {p}", self.region),
            None => f.write_str(&self.region),
        }
    }
}

/// One entity row of a wide table; `values[i]` belongs to `WideTable::dates[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeriesRow {
    pub entity: EntityId,
    pub values: Vec<Option<i64>>,
}

/// A wide table: one row per entity, one column per date.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub metric: Metric,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<RawSeriesRow>,
}

/// One observation in long format.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub entity: EntityId,
    pub date: NaiveDate,
    pub value: Option<i64>,
}

/// A long table for a single metric.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    pub metric: Metric,
    pub rows: Vec<LongRow>,
}

/// Column order of the combined table, shared by CSV exports and SQLite.
pub const COMBINED_COLUMNS: [&str; 17] = [
    "Province/State",
    "Country/Region",
    "Lat",
    "Long",
    "Date",
    "Confirmed",
    "Deaths",
    "Recovered",
    "Active",
    "New_Confirmed",
    "New_Deaths",
    "New_Recovered",
    "Mortality_Rate",
    "Recovery_Rate",
    "Year",
    "Month",
    "DayOfWeek",
];

/// A fully derived observation: the row type consumed by reporting and storage.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub entity: EntityId,
    pub date: NaiveDate,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    /// `confirmed - deaths - recovered`; negative when the source is inconsistent.
    pub active: i64,
    pub new_confirmed: i64,
    pub new_deaths: i64,
    pub new_recovered: i64,
    /// Percent of confirmed; 0 when confirmed is 0.
    pub mortality_rate: f64,
    pub recovery_rate: f64,
    pub year: i32,
    pub month: u32,
    pub day_of_week: String,
    /// False when the source cell for confirmed was blank and 0 was filled in.
    /// Such rows (and the row after them) get a confirmed delta of 0.
    pub confirmed_reported: bool,
}

impl MergedRow {
    /// Build a row from cumulative counts; deltas start at zero and are filled in
    /// by `transform::derive_daily_deltas` once rows are sorted.
    pub fn from_counts(entity: EntityId, date: NaiveDate, confirmed: i64, deaths: i64, recovered: i64) -> Self {
        Self {
            entity,
            date,
            confirmed,
            deaths,
            recovered,
            active: confirmed - deaths - recovered,
            new_confirmed: 0,
            new_deaths: 0,
            new_recovered: 0,
            mortality_rate: rate_pct(deaths, confirmed),
            recovery_rate: rate_pct(recovered, confirmed),
            year: date.year(),
            month: date.month(),
            day_of_week: weekday_name(date.weekday()).to_string(),
            confirmed_reported: true,
        }
    }

    pub fn count(&self, metric: Metric) -> i64 {
        match metric {
            Metric::Confirmed => self.confirmed,
            Metric::Deaths => self.deaths,
            Metric::Recovered => self.recovered,
        }
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn rate_pct(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ordering_is_region_then_province_then_coords() {
        let a = EntityId::new(None, "Australia", Some(-35.0), Some(149.0));
        let b = EntityId::new(Some("Victoria".into()), "Australia", Some(-37.0), Some(144.0));
        let c = EntityId::new(None, "Brazil", None, None);
        let mut ids = vec![c.clone(), b.clone(), a.clone()];
        ids.sort();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[test]
    fn entity_equality_includes_coordinates() {
        let a = EntityId::new(None, "France", Some(46.2), Some(2.2));
        let b = EntityId::new(None, "France", Some(46.2), Some(2.3));
        let c = EntityId::new(None, "France", None, Some(2.2));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn from_counts_guards_zero_confirmed() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        let row = MergedRow::from_counts(EntityId::new(None, "X", None, None), date, 0, 0, 0);
        assert_eq!(row.mortality_rate, 0.0);
        assert_eq!(row.recovery_rate, 0.0);
        assert_eq!(row.active, 0);
        assert_eq!(row.day_of_week, "Monday");
        assert_eq!((row.year, row.month), (2021, 3));
    }

    #[test]
    fn active_can_go_negative() {
        let date = NaiveDate::from_ymd_opt(2020, 5, 5).unwrap();
        let row = MergedRow::from_counts(EntityId::new(None, "X", None, None), date, 10, 4, 8);
        assert_eq!(row.active, -2);
        assert!((row.mortality_rate - 40.0).abs() < 1e-9);
        assert!((row.recovery_rate - 80.0).abs() < 1e-9);
    }
}
