//! Combine the confirmed/deaths/recovered series into one derived table.
//!
//! Steps:
//! 1) left-join deaths and recovered onto confirmed by `(entity, date)`
//! 2) fill gaps with 0 and derive `active` and the rate columns
//! 3) sort by entity then date
//! 4) first-difference the cumulative counts within each entity

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::NaiveDate;
use log::{debug, warn};

use crate::domain::{EntityId, LongTable, MergedRow, Metric, WideTable};
use crate::error::AppError;
use crate::transform::melt;

/// Melt the three wide tables and combine them.
pub fn combine_wide(
    confirmed: &WideTable,
    deaths: &WideTable,
    recovered: &WideTable,
) -> Result<Vec<MergedRow>, AppError> {
    combine(&melt(confirmed), &melt(deaths), &melt(recovered))
}

/// Join three long tables on `(entity, date)` with confirmed as the anchor.
///
/// Every confirmed observation produces exactly one output row. Deaths or
/// recovered values that are missing (no row, or an empty cell) become 0, as
/// does an empty confirmed cell.
pub fn combine(
    confirmed: &LongTable,
    deaths: &LongTable,
    recovered: &LongTable,
) -> Result<Vec<MergedRow>, AppError> {
    expect_metric(confirmed, Metric::Confirmed)?;
    expect_metric(deaths, Metric::Deaths)?;
    expect_metric(recovered, Metric::Recovered)?;

    if confirmed.rows.is_empty() {
        return Err(AppError::new(3, "Confirmed series has no observations to combine."));
    }

    let deaths_by_key = index_by_key(deaths);
    let recovered_by_key = index_by_key(recovered);

    let mut rows: Vec<MergedRow> = confirmed
        .rows
        .iter()
        .map(|r| {
            let mut row = MergedRow::from_counts(
                r.entity.clone(),
                r.date,
                r.value.unwrap_or(0),
                lookup(&deaths_by_key, &r.entity, r.date),
                lookup(&recovered_by_key, &r.entity, r.date),
            );
            row.confirmed_reported = r.value.is_some();
            row
        })
        .collect();

    sort_rows(&mut rows);
    derive_daily_deltas(&mut rows);

    debug!("combined {} rows", rows.len());
    Ok(rows)
}

fn expect_metric(table: &LongTable, expected: Metric) -> Result<(), AppError> {
    if table.metric != expected {
        return Err(AppError::new(
            3,
            format!("Expected the {expected} series but got {}.", table.metric),
        ));
    }
    Ok(())
}

/// Index a long table by key. The first occurrence of a repeated key wins.
fn index_by_key(table: &LongTable) -> HashMap<(&EntityId, NaiveDate), Option<i64>> {
    let mut index = HashMap::with_capacity(table.rows.len());
    let mut duplicates = 0usize;
    for r in &table.rows {
        match index.entry((&r.entity, r.date)) {
            Entry::Occupied(_) => duplicates += 1,
            Entry::Vacant(slot) => {
                slot.insert(r.value);
            }
        }
    }
    if duplicates > 0 {
        warn!(
            "{}: {duplicates} duplicate (entity, date) observations ignored",
            table.metric
        );
    }
    index
}

fn lookup<'a>(
    index: &HashMap<(&'a EntityId, NaiveDate), Option<i64>>,
    entity: &'a EntityId,
    date: NaiveDate,
) -> i64 {
    index.get(&(entity, date)).copied().flatten().unwrap_or(0)
}

/// Stable sort by entity identity, then date.
pub fn sort_rows(rows: &mut [MergedRow]) {
    rows.sort_by(|a, b| a.entity.cmp(&b.entity).then(a.date.cmp(&b.date)));
}

/// Fill `new_*` columns as first differences within each entity.
///
/// `rows` must already be sorted with `sort_rows`. The first row of each
/// entity gets 0. Downward revisions yield negative deltas. A confirmed delta
/// touching an unreported confirmed cell is 0.
pub fn derive_daily_deltas(rows: &mut [MergedRow]) {
    for i in 0..rows.len() {
        let prev = if i > 0 && rows[i - 1].entity == rows[i].entity {
            let p = &rows[i - 1];
            Some((p.confirmed, p.deaths, p.recovered, p.confirmed_reported))
        } else {
            None
        };

        let row = &mut rows[i];
        let (c, d, r, reported) =
            prev.unwrap_or((row.confirmed, row.deaths, row.recovered, row.confirmed_reported));
        row.new_confirmed = if reported && row.confirmed_reported {
            row.confirmed - c
        } else {
            0
        };
        row.new_deaths = row.deaths - d;
        row.new_recovered = row.recovered - r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LongRow, RawSeriesRow};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 4, day).unwrap()
    }

    fn entity(region: &str) -> EntityId {
        EntityId::new(None, region, Some(1.0), Some(2.0))
    }

    fn long(metric: Metric, rows: Vec<(EntityId, NaiveDate, Option<i64>)>) -> LongTable {
        LongTable {
            metric,
            rows: rows
                .into_iter()
                .map(|(entity, date, value)| LongRow { entity, date, value })
                .collect(),
        }
    }

    fn empty(metric: Metric) -> LongTable {
        LongTable { metric, rows: Vec::new() }
    }

    #[test]
    fn deltas_respect_entity_boundaries_regardless_of_input_order() {
        let (a, b) = (entity("A"), entity("B"));
        // Interleaved and out of date order on purpose.
        let confirmed = long(
            Metric::Confirmed,
            vec![
                (b.clone(), d(3), Some(20)),
                (a.clone(), d(2), Some(15)),
                (b.clone(), d(1), Some(10)),
                (a.clone(), d(3), Some(20)),
                (b.clone(), d(2), Some(15)),
                (a.clone(), d(1), Some(10)),
            ],
        );

        let rows = combine(&confirmed, &empty(Metric::Deaths), &empty(Metric::Recovered)).unwrap();
        assert_eq!(rows.len(), 6);

        for region in ["A", "B"] {
            let part: Vec<&MergedRow> = rows.iter().filter(|r| r.entity.region == region).collect();
            let dates: Vec<NaiveDate> = part.iter().map(|r| r.date).collect();
            assert_eq!(dates, vec![d(1), d(2), d(3)]);
            let deltas: Vec<i64> = part.iter().map(|r| r.new_confirmed).collect();
            assert_eq!(deltas, vec![0, 5, 5], "region {region}");
        }
        assert_eq!(rows[0].entity.region, "A");
        assert_eq!(rows[3].entity.region, "B");
    }

    #[test]
    fn confirmed_is_the_anchor_and_gaps_fill_with_zero() {
        let (a, b) = (entity("A"), entity("B"));
        let confirmed = long(
            Metric::Confirmed,
            vec![(a.clone(), d(1), Some(100)), (b.clone(), d(1), None)],
        );
        let deaths = long(
            Metric::Deaths,
            vec![
                (a.clone(), d(1), Some(3)),
                // Not in confirmed: must not create a row.
                (entity("C"), d(1), Some(9)),
            ],
        );
        let recovered = long(Metric::Recovered, vec![(a.clone(), d(1), None)]);

        let rows = combine(&confirmed, &deaths, &recovered).unwrap();
        assert_eq!(rows.len(), 2);

        let ra = &rows[0];
        assert_eq!((ra.confirmed, ra.deaths, ra.recovered, ra.active), (100, 3, 0, 97));
        assert!((ra.mortality_rate - 3.0).abs() < 1e-9);

        let rb = &rows[1];
        assert_eq!((rb.confirmed, rb.deaths, rb.recovered), (0, 0, 0));
        assert_eq!(rb.mortality_rate, 0.0);
        assert_eq!(rb.recovery_rate, 0.0);
    }

    #[test]
    fn derived_invariants_hold() {
        let a = entity("A");
        let confirmed = long(
            Metric::Confirmed,
            vec![(a.clone(), d(1), Some(50)), (a.clone(), d(2), Some(40)), (a.clone(), d(3), Some(60))],
        );
        let deaths = long(
            Metric::Deaths,
            vec![(a.clone(), d(1), Some(1)), (a.clone(), d(2), Some(2)), (a.clone(), d(3), Some(2))],
        );
        let recovered = long(
            Metric::Recovered,
            vec![(a.clone(), d(1), Some(10)), (a.clone(), d(2), Some(30)), (a.clone(), d(3), Some(45))],
        );

        let rows = combine(&confirmed, &deaths, &recovered).unwrap();
        for r in &rows {
            assert_eq!(r.active, r.confirmed - r.deaths - r.recovered);
            assert!(r.mortality_rate >= 0.0);
        }
        assert_eq!((rows[0].new_confirmed, rows[0].new_deaths, rows[0].new_recovered), (0, 0, 0));
        // Downward revision is kept, not clamped.
        assert_eq!(rows[1].new_confirmed, -10);
        assert_eq!(rows[2].new_recovered, 15);
    }

    #[test]
    fn blank_confirmed_cell_does_not_fake_a_drop_and_rebound() {
        let a = entity("A");
        let confirmed = long(
            Metric::Confirmed,
            vec![
                (a.clone(), d(1), Some(100)),
                (a.clone(), d(2), None),
                (a.clone(), d(3), Some(120)),
                (a.clone(), d(4), Some(125)),
            ],
        );
        let rows = combine(&confirmed, &empty(Metric::Deaths), &empty(Metric::Recovered)).unwrap();

        let counts: Vec<i64> = rows.iter().map(|r| r.confirmed).collect();
        assert_eq!(counts, vec![100, 0, 120, 125]);
        assert!(!rows[1].confirmed_reported);

        let deltas: Vec<i64> = rows.iter().map(|r| r.new_confirmed).collect();
        assert_eq!(deltas, vec![0, 0, 0, 5]);
    }

    #[test]
    fn same_region_different_provinces_are_separate_partitions() {
        let p1 = EntityId::new(Some("Ontario".into()), "Canada", Some(51.2), Some(-85.3));
        let p2 = EntityId::new(Some("Quebec".into()), "Canada", Some(52.9), Some(-73.5));
        let confirmed = long(
            Metric::Confirmed,
            vec![
                (p1.clone(), d(1), Some(5)),
                (p1.clone(), d(2), Some(8)),
                (p2.clone(), d(1), Some(100)),
                (p2.clone(), d(2), Some(130)),
            ],
        );
        let rows = combine(&confirmed, &empty(Metric::Deaths), &empty(Metric::Recovered)).unwrap();
        let deltas: Vec<i64> = rows.iter().map(|r| r.new_confirmed).collect();
        assert_eq!(deltas, vec![0, 3, 0, 30]);
    }

    #[test]
    fn wrong_metric_is_malformed() {
        let err = combine(
            &empty(Metric::Deaths),
            &empty(Metric::Deaths),
            &empty(Metric::Recovered),
        )
        .unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn combine_wide_melts_each_table() {
        let a = entity("A");
        let table = |metric, values: Vec<Option<i64>>| WideTable {
            metric,
            dates: vec![d(1), d(2)],
            rows: vec![RawSeriesRow { entity: a.clone(), values }],
        };
        let rows = combine_wide(
            &table(Metric::Confirmed, vec![Some(10), Some(12)]),
            &table(Metric::Deaths, vec![Some(1), Some(1)]),
            &table(Metric::Recovered, vec![None, Some(5)]),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].new_recovered, 5);
        assert_eq!(rows[1].active, 6);
    }
}
