//! SQLite persistence of the combined table plus a fixed set of read queries.
//!
//! Loading and querying use separate connections: the writer opens the file,
//! replaces the table inside one transaction, and closes; queries then open
//! the file read-only.

use std::fs;
use std::path::Path;

use log::{debug, info};
use rusqlite::{Connection, OpenFlags, params};

use crate::domain::{COMBINED_COLUMNS, MergedRow};
use crate::error::AppError;
use crate::report::Totals;

pub const TABLE_NAME: &str = "covid19_global";

/// Only rows above this many confirmed cases count towards the mortality ranking.
pub const MORTALITY_MIN_CONFIRMED: i64 = 1000;

/// Quote an SQL identifier (column names contain `/`).
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn column_type(name: &str) -> &'static str {
    match name {
        "Province/State" | "Country/Region" | "Date" | "DayOfWeek" => "TEXT",
        "Lat" | "Long" | "Mortality_Rate" | "Recovery_Rate" => "REAL",
        _ => "INTEGER",
    }
}

fn create_table_sql() -> String {
    let columns: Vec<String> = COMBINED_COLUMNS
        .iter()
        .map(|c| format!("{} {}", quote_ident(c), column_type(c)))
        .collect();
    format!("CREATE TABLE {TABLE_NAME} ({})", columns.join(", "))
}

fn insert_sql() -> String {
    let names: Vec<String> = COMBINED_COLUMNS.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=COMBINED_COLUMNS.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {TABLE_NAME} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    )
}

/// Replace the table in `db_path` with `rows`. Returns the number of rows written.
pub fn load_rows(db_path: &Path, rows: &[MergedRow]) -> Result<usize, AppError> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(2, format!("Failed to create directory '{}': {e}", parent.display()))
        })?;
    }

    let mut conn = Connection::open(db_path)?;
    let tx = conn.transaction()?;
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {TABLE_NAME}; {};", create_table_sql()))?;
    {
        let mut stmt = tx.prepare(&insert_sql())?;
        for r in rows {
            stmt.execute(params![
                r.entity.province.as_deref(),
                r.entity.region,
                r.entity.lat,
                r.entity.long,
                r.date.to_string(),
                r.confirmed,
                r.deaths,
                r.recovered,
                r.active,
                r.new_confirmed,
                r.new_deaths,
                r.new_recovered,
                r.mortality_rate,
                r.recovery_rate,
                r.year,
                r.month,
                r.day_of_week,
            ])?;
        }
    }
    tx.commit()?;

    info!("Loaded {} rows into {} ({})", rows.len(), TABLE_NAME, db_path.display());
    Ok(rows.len())
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionCount {
    pub region: String,
    pub confirmed: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyTrend {
    /// `YYYY-MM`.
    pub month: String,
    pub new_confirmed: i64,
    pub new_deaths: i64,
    pub new_recovered: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MortalityRow {
    pub region: String,
    pub confirmed: i64,
    pub deaths: i64,
    /// Rounded to two decimals by SQLite.
    pub mortality_rate: f64,
}

/// Results of the illustrative queries.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryReport {
    pub columns: Vec<String>,
    pub top_regions: Vec<RegionCount>,
    pub totals: Totals,
    pub monthly: Vec<MonthlyTrend>,
    pub highest_mortality: Vec<MortalityRow>,
}

/// Read-only handle on a loaded database.
pub struct CaseStore {
    conn: Connection,
}

impl std::fmt::Debug for CaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaseStore").finish_non_exhaustive()
    }
}

impl CaseStore {
    pub fn open_read_only(db_path: &Path) -> Result<Self, AppError> {
        if !db_path.exists() {
            return Err(AppError::new(
                4,
                format!("Database '{}' does not exist.", db_path.display()),
            ));
        }
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Column names as stored (`PRAGMA table_info`).
    pub fn columns(&self) -> Result<Vec<String>, AppError> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info({TABLE_NAME})"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    pub fn row_count(&self) -> Result<i64, AppError> {
        let n = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE_NAME}"), [], |row| row.get(0))?;
        Ok(n)
    }

    /// Regions ranked by confirmed cases on the latest date (ties by name).
    pub fn top_regions_by_confirmed(&self, limit: usize) -> Result<Vec<RegionCount>, AppError> {
        let sql = format!(
            "SELECT \"Country/Region\", SUM(Confirmed) AS TotalConfirmed
             FROM {TABLE_NAME}
             WHERE Date = (SELECT MAX(Date) FROM {TABLE_NAME})
             GROUP BY \"Country/Region\"
             ORDER BY TotalConfirmed DESC, \"Country/Region\" ASC
             LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RegionCount {
                    region: row.get(0)?,
                    confirmed: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Global totals on the latest date.
    pub fn global_totals(&self) -> Result<Totals, AppError> {
        let sql = format!(
            "SELECT
                COALESCE(SUM(Confirmed), 0),
                COALESCE(SUM(Deaths), 0),
                COALESCE(SUM(Recovered), 0),
                COALESCE(SUM(Active), 0)
             FROM {TABLE_NAME}
             WHERE Date = (SELECT MAX(Date) FROM {TABLE_NAME})"
        );
        let totals = self.conn.query_row(&sql, [], |row| {
            Ok(Totals {
                confirmed: row.get(0)?,
                deaths: row.get(1)?,
                recovered: row.get(2)?,
                active: row.get(3)?,
            })
        })?;
        Ok(totals)
    }

    /// Sum of daily deltas per calendar month, earliest first.
    pub fn monthly_trends(&self, limit: usize) -> Result<Vec<MonthlyTrend>, AppError> {
        let sql = format!(
            "SELECT
                strftime('%Y-%m', Date) AS YearMonth,
                SUM(New_Confirmed) AS NewCases,
                SUM(New_Deaths) AS NewDeaths,
                SUM(New_Recovered) AS NewRecovered
             FROM {TABLE_NAME}
             GROUP BY YearMonth
             ORDER BY YearMonth
             LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(MonthlyTrend {
                    month: row.get(0)?,
                    new_confirmed: row.get(1)?,
                    new_deaths: row.get(2)?,
                    new_recovered: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Regions with the highest mortality on the latest date, counting only
    /// rows with more than `min_confirmed` cases.
    pub fn highest_mortality(&self, min_confirmed: i64, limit: usize) -> Result<Vec<MortalityRow>, AppError> {
        let sql = format!(
            "SELECT
                \"Country/Region\",
                SUM(Confirmed) AS TotalConfirmed,
                SUM(Deaths) AS TotalDeaths,
                ROUND((SUM(Deaths) * 100.0 / SUM(Confirmed)), 2) AS MortalityRate
             FROM {TABLE_NAME}
             WHERE Date = (SELECT MAX(Date) FROM {TABLE_NAME})
                AND Confirmed > ?1
             GROUP BY \"Country/Region\"
             ORDER BY MortalityRate DESC, \"Country/Region\" ASC
             LIMIT ?2"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![min_confirmed, limit as i64], |row| {
                Ok(MortalityRow {
                    region: row.get(0)?,
                    confirmed: row.get(1)?,
                    deaths: row.get(2)?,
                    mortality_rate: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

/// Open the database read-only and run every illustrative query.
pub fn run_queries(db_path: &Path, top_n: usize) -> Result<QueryReport, AppError> {
    let store = CaseStore::open_read_only(db_path)?;
    debug!("{} rows in {TABLE_NAME}", store.row_count()?);

    Ok(QueryReport {
        columns: store.columns()?,
        top_regions: store.top_regions_by_confirmed(top_n)?,
        totals: store.global_totals()?,
        monthly: store.monthly_trends(12)?,
        highest_mortality: store.highest_mortality(MORTALITY_MIN_CONFIRMED, 5)?,
    })
}
