//! Synthetic combined dataset used when the upstream series are unavailable.
//!
//! The generator produces rows directly in combined form. Counts are
//! cumulative and non-decreasing per region; deaths and recovered are fixed
//! fractions of confirmed. Deltas and rates go through the same derive step as
//! real data, so the generated table satisfies the same invariants.

use std::collections::hash_map::DefaultHasher;
use std::f64::consts::PI;
use std::hash::{Hash, Hasher};

use chrono::{Duration, NaiveDate};
use log::info;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{EntityId, MergedRow};
use crate::error::AppError;
use crate::transform::{derive_daily_deltas, sort_rows};

/// `(region, lat, long, relative size)`.
pub const SAMPLE_REGIONS: [(&str, f64, f64, f64); 10] = [
    ("US", 40.0, -100.0, 10.0),
    ("India", 20.593684, 78.96288, 9.0),
    ("Brazil", -14.235, -51.9253, 7.0),
    ("UK", 55.3781, -3.436, 4.0),
    ("Germany", 51.165691, 10.451526, 4.5),
    ("France", 46.2276, 2.2137, 5.0),
    ("Italy", 41.87194, 12.56738, 3.5),
    ("Spain", 40.463667, -3.74922, 3.0),
    ("Russia", 61.52401, 105.318756, 4.0),
    ("China", 35.86166, 104.195397, 1.0),
];

/// Deaths as a fraction of confirmed, in basis points (2%).
const DEATH_FRACTION_BP: i64 = 200;
/// Recovered as a fraction of confirmed, in basis points (85%).
const RECOVERY_FRACTION_BP: i64 = 8_500;

/// Mean daily new cases for a region of relative size 1.0.
const BASE_DAILY_CASES: f64 = 800.0;
/// Length of one synthetic infection wave, in days.
const WAVE_PERIOD_DAYS: f64 = 180.0;

pub const SAMPLE_START: NaiveDate = NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid calendar date");
pub const SAMPLE_END: NaiveDate = NaiveDate::from_ymd_opt(2023, 12, 31).expect("valid calendar date");

/// Generate the default four-year daily sample.
pub fn generate_sample(seed: u64) -> Result<Vec<MergedRow>, AppError> {
    generate_sample_between(seed, SAMPLE_START, SAMPLE_END)
}

/// Generate a daily sample for every region in `[start, end]`.
pub fn generate_sample_between(seed: u64, start: NaiveDate, end: NaiveDate) -> Result<Vec<MergedRow>, AppError> {
    if end < start {
        return Err(AppError::new(2, "Sample end date precedes start date."));
    }

    let n_days = (end - start).num_days() + 1;
    let normal = Normal::new(0.0, 0.35)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;

    let mut rows = Vec::with_capacity(n_days as usize * SAMPLE_REGIONS.len());

    for &(region, lat, long, size) in &SAMPLE_REGIONS {
        let mut rng = StdRng::seed_from_u64(region_seed(seed, region));
        // Each region's waves start at a different phase.
        let phase = rng.gen_range(0.0..(2.0 * PI));
        let entity = EntityId::new(None, region, Some(lat), Some(long));

        let mut confirmed: i64 = 0;
        for day in 0..n_days {
            let wave = 1.0 + 0.9 * ((2.0 * PI * day as f64 / WAVE_PERIOD_DAYS) + phase).sin();
            let z: f64 = normal.sample(&mut rng);
            let mean = BASE_DAILY_CASES * size * wave.max(0.05);
            let new_cases = (mean * z.exp()).round().max(0.0) as i64;
            confirmed += new_cases;

            let date = start + Duration::days(day);
            rows.push(MergedRow::from_counts(
                entity.clone(),
                date,
                confirmed,
                confirmed * DEATH_FRACTION_BP / 10_000,
                confirmed * RECOVERY_FRACTION_BP / 10_000,
            ));
        }
    }

    sort_rows(&mut rows);
    derive_daily_deltas(&mut rows);

    info!(
        "Sample dataset created: {} records, {} regions, {start} to {end}",
        rows.len(),
        SAMPLE_REGIONS.len()
    );
    Ok(rows)
}

fn region_seed(seed: u64, region: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    region.hash(&mut hasher);
    hasher.finish()
}
