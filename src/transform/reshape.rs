//! Melt and pivot between wide and long tables.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use rayon::prelude::*;

use crate::domain::{EntityId, LongRow, LongTable, RawSeriesRow, WideTable};
use crate::error::AppError;

/// Pivot a wide table into one row per `(entity, date)`.
///
/// Rows are emitted entity-major, dates in column order. Missing cells are
/// kept as `None` so the table can be pivoted back losslessly.
pub fn melt(table: &WideTable) -> LongTable {
    // Each entity row expands independently (parallel); `collect` keeps order.
    let rows: Vec<LongRow> = table
        .rows
        .par_iter()
        .flat_map_iter(|row| {
            table
                .dates
                .iter()
                .zip(row.values.iter())
                .map(move |(&date, &value)| LongRow {
                    entity: row.entity.clone(),
                    date,
                    value,
                })
        })
        .collect();

    LongTable {
        metric: table.metric,
        rows,
    }
}

/// Pivot a long table back to wide form.
///
/// Entities keep their first-seen order; date columns are ascending. Cells
/// with no long row are `None`. A repeated `(entity, date)` pair is malformed.
pub fn pivot(table: &LongTable) -> Result<WideTable, AppError> {
    let dates: Vec<NaiveDate> = table
        .rows
        .iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let date_pos: HashMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();

    let mut entity_pos: HashMap<&EntityId, usize> = HashMap::new();
    let mut rows: Vec<RawSeriesRow> = Vec::new();
    let mut filled: Vec<Vec<bool>> = Vec::new();

    for r in &table.rows {
        let idx = *entity_pos.entry(&r.entity).or_insert_with(|| {
            rows.push(RawSeriesRow {
                entity: r.entity.clone(),
                values: vec![None; dates.len()],
            });
            filled.push(vec![false; dates.len()]);
            rows.len() - 1
        });
        let col = date_pos[&r.date];
        if filled[idx][col] {
            return Err(AppError::new(
                3,
                format!(
                    "Duplicate {} observation for {} on {}.",
                    table.metric, r.entity, r.date
                ),
            ));
        }
        filled[idx][col] = true;
        rows[idx].values[col] = r.value;
    }

    Ok(WideTable {
        metric: table.metric,
        dates,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Metric;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, day).unwrap()
    }

    fn wide() -> WideTable {
        WideTable {
            metric: Metric::Deaths,
            dates: vec![d(1), d(2), d(3)],
            rows: vec![
                RawSeriesRow {
                    entity: EntityId::new(None, "Italy", Some(41.9), Some(12.6)),
                    values: vec![Some(1), None, Some(7)],
                },
                RawSeriesRow {
                    entity: EntityId::new(Some("Hubei".into()), "China", Some(30.9), Some(112.3)),
                    values: vec![Some(10), Some(12), Some(15)],
                },
            ],
        }
    }

    #[test]
    fn melt_emits_one_row_per_cell() {
        let long = melt(&wide());
        assert_eq!(long.metric, Metric::Deaths);
        assert_eq!(long.rows.len(), 6);
        assert_eq!(long.rows[0].entity.region, "Italy");
        assert_eq!(long.rows[0].date, d(1));
        assert_eq!(long.rows[1].value, None);
        assert_eq!(long.rows[5].entity.region, "China");
        assert_eq!(long.rows[5].value, Some(15));
    }

    #[test]
    fn pivot_after_melt_reproduces_wide_values() {
        let original = wide();
        let back = pivot(&melt(&original)).unwrap();
        assert_eq!(back, original);

        // Flattening again gives the same long rows.
        assert_eq!(melt(&back), melt(&original));
    }

    #[test]
    fn pivot_sorts_dates_and_fills_gaps() {
        let e = EntityId::new(None, "Spain", None, None);
        let long = LongTable {
            metric: Metric::Confirmed,
            rows: vec![
                LongRow { entity: e.clone(), date: d(3), value: Some(3) },
                LongRow { entity: e.clone(), date: d(1), value: Some(1) },
                LongRow { entity: EntityId::new(None, "Peru", None, None), date: d(2), value: Some(9) },
            ],
        };
        let table = pivot(&long).unwrap();
        assert_eq!(table.dates, vec![d(1), d(2), d(3)]);
        assert_eq!(table.rows[0].values, vec![Some(1), None, Some(3)]);
        assert_eq!(table.rows[1].values, vec![None, Some(9), None]);
    }

    #[test]
    fn pivot_rejects_duplicates() {
        let e = EntityId::new(None, "Spain", None, None);
        let long = LongTable {
            metric: Metric::Confirmed,
            rows: vec![
                LongRow { entity: e.clone(), date: d(1), value: Some(1) },
                LongRow { entity: e, date: d(1), value: Some(2) },
            ],
        };
        assert!(pivot(&long).unwrap_err().is_malformed());
    }
}
