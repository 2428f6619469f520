//! Plotters-powered SVG charts.
//!
//! Chart data (bars, trend lines, scatter points) is computed by small pure
//! functions first; the `draw_*` functions only draw. Each chart is written to
//! its own file under the charts directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use log::info;
use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::{MergedRow, Metric};
use crate::error::AppError;
use crate::report::{DailyTotals, RegionTotals, fmt_compact, global_daily, latest_date, region_totals_on, top_regions};

pub const TOP_COUNTRIES_CHART: &str = "top_countries_comparison.svg";
pub const GLOBAL_TRENDS_CHART: &str = "global_trends.svg";
pub const RATE_SCATTER_CHART: &str = "mortality_recovery_scatter.svg";

/// Regions plotted in the mortality/recovery scatter.
const SCATTER_REGIONS: usize = 20;
/// Scatter points above either threshold get a text label.
const LABEL_MORTALITY_PCT: f64 = 2.0;
const LABEL_RECOVERY_PCT: f64 = 80.0;

type DrawResult<T> = Result<T, Box<dyn std::error::Error>>;
type Area<'a> = DrawingArea<SVGBackend<'a>, Shift>;

/// One bubble of the mortality/recovery scatter.
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterPoint {
    pub region: String,
    pub mortality_rate: f64,
    pub recovery_rate: f64,
    pub confirmed: i64,
    pub labeled: bool,
}

/// Render every chart into `dir` and return the written paths.
pub fn render_all(rows: &[MergedRow], dir: &Path, top_n: usize) -> Result<Vec<PathBuf>, AppError> {
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create chart directory '{}': {e}", dir.display())))?;

    let latest = latest_date(rows).ok_or_else(|| AppError::new(3, "No rows to chart."))?;
    let regions = region_totals_on(rows, latest);
    let daily = global_daily(rows);

    let mut written = Vec::new();

    let path = dir.join(TOP_COUNTRIES_CHART);
    draw_top_countries(&path, &regions, top_n).map_err(|e| render_error(TOP_COUNTRIES_CHART, e))?;
    info!("Created: {TOP_COUNTRIES_CHART}");
    written.push(path);

    let path = dir.join(GLOBAL_TRENDS_CHART);
    draw_global_trends(&path, &daily).map_err(|e| render_error(GLOBAL_TRENDS_CHART, e))?;
    info!("Created: {GLOBAL_TRENDS_CHART}");
    written.push(path);

    let path = dir.join(RATE_SCATTER_CHART);
    let points = scatter_points(&regions, SCATTER_REGIONS);
    draw_rate_scatter(&path, &points).map_err(|e| render_error(RATE_SCATTER_CHART, e))?;
    info!("Created: {RATE_SCATTER_CHART}");
    written.push(path);

    Ok(written)
}

fn render_error(name: &str, e: Box<dyn std::error::Error>) -> AppError {
    AppError::new(5, format!("Failed to render {name}: {e}"))
}

/// `(day offset from the first date, value)` for one global series.
pub fn trend_series(daily: &[DailyTotals], value: fn(&DailyTotals) -> i64) -> Vec<(i32, f64)> {
    let Some(start) = daily.first().map(|d| d.date) else {
        return Vec::new();
    };
    daily
        .iter()
        .map(|d| ((d.date - start).num_days() as i32, value(d) as f64))
        .collect()
}

/// Top regions by confirmed with their rates, flagged for labelling.
pub fn scatter_points(regions: &[RegionTotals], n: usize) -> Vec<ScatterPoint> {
    top_regions(regions, Metric::Confirmed, n)
        .into_iter()
        .map(|r| ScatterPoint {
            labeled: r.mortality_rate > LABEL_MORTALITY_PCT || r.recovery_rate > LABEL_RECOVERY_PCT,
            region: r.region,
            mortality_rate: r.mortality_rate,
            recovery_rate: r.recovery_rate,
            confirmed: r.totals.confirmed,
        })
        .collect()
}

fn draw_top_countries(path: &Path, regions: &[RegionTotals], top_n: usize) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1400, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((1, 2));

    let confirmed = top_regions(regions, Metric::Confirmed, top_n);
    let deaths = top_regions(regions, Metric::Deaths, top_n);

    draw_bar_panel(
        &panels[0],
        &format!("Top {top_n} Countries - Total Confirmed Cases"),
        "Confirmed Cases",
        &confirmed,
        Metric::Confirmed,
        RGBColor(66, 133, 244),
    )?;
    draw_bar_panel(
        &panels[1],
        &format!("Top {top_n} Countries - Total Deaths"),
        "Deaths",
        &deaths,
        Metric::Deaths,
        RGBColor(200, 40, 40),
    )?;

    root.present()?;
    Ok(())
}

fn draw_bar_panel(
    area: &Area<'_>,
    title: &str,
    x_desc: &str,
    bars: &[RegionTotals],
    metric: Metric,
    color: RGBColor,
) -> DrawResult<()> {
    let n = bars.len() as i32;
    let max = bars
        .iter()
        .map(|r| r.totals.count(metric))
        .max()
        .unwrap_or(0)
        .max(1) as f64;

    // Segments run bottom-up; rank 1 goes in the top segment.
    let label_for = |seg: &SegmentValue<i32>| -> String {
        match seg {
            SegmentValue::CenterOf(j) => usize::try_from(n - 1 - *j)
                .ok()
                .and_then(|i| bars.get(i))
                .map(|r| r.region.clone())
                .unwrap_or_default(),
            _ => String::new(),
        }
    };

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(120)
        .build_cartesian_2d(0f64..max * 1.05, (0..n.max(1)).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .x_desc(x_desc)
        .x_labels(6)
        .y_labels(bars.len().max(1))
        .x_label_formatter(&|v| fmt_compact(*v))
        .y_label_formatter(&label_for)
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, r)| {
        let seg = n - 1 - i as i32;
        let value = r.totals.count(metric) as f64;
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(seg)), (value, SegmentValue::Exact(seg + 1))],
            color.filled(),
        );
        bar.set_margin(4, 4, 0, 0);
        bar
    }))?;

    Ok(())
}

fn draw_global_trends(path: &Path, daily: &[DailyTotals]) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1400, 1000)).into_drawing_area();
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    let start = daily.first().map(|d| d.date).unwrap_or_default();

    let series: [(&str, &str, &str, fn(&DailyTotals) -> i64, RGBColor); 4] = [
        ("Global Confirmed Cases Over Time", "Cases", "Confirmed", |d| d.totals.confirmed, RGBColor(31, 119, 180)),
        ("Global Deaths Over Time", "Deaths", "Deaths", |d| d.totals.deaths, RED),
        ("Global Recovered Cases Over Time", "Recovered", "Recovered", |d| d.totals.recovered, RGBColor(44, 160, 44)),
        ("Global Active Cases Over Time", "Active Cases", "Active", |d| d.totals.active, RGBColor(255, 127, 14)),
    ];

    for (panel, (title, y_desc, label, value, color)) in panels.iter().zip(series) {
        let points = trend_series(daily, value);
        draw_trend_panel(panel, title, y_desc, label, start, &points, color)?;
    }

    root.present()?;
    Ok(())
}

fn draw_trend_panel(
    area: &Area<'_>,
    title: &str,
    y_desc: &str,
    label: &str,
    start: NaiveDate,
    points: &[(i32, f64)],
    color: RGBColor,
) -> DrawResult<()> {
    let x_max = points.last().map(|p| p.0).unwrap_or(0).max(1);
    let y_max = points.iter().map(|p| p.1).fold(0.0, f64::max).max(1.0);
    // Active can go negative on inconsistent data.
    let y_min = points.iter().map(|p| p.1).fold(0.0, f64::min);

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0i32..x_max, y_min..y_max * 1.05)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc(y_desc)
        .x_labels(6)
        .y_labels(6)
        .x_label_formatter(&|d| (start + Duration::days(i64::from(*d))).format("%Y-%m").to_string())
        .y_label_formatter(&|v| fmt_compact(*v))
        .draw()?;

    chart
        .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
        .label(label)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    Ok(())
}

fn draw_rate_scatter(path: &Path, points: &[ScatterPoint]) -> DrawResult<()> {
    let root = SVGBackend::new(path, (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let x_max = points
        .iter()
        .map(|p| p.mortality_rate)
        .fold(0.0, f64::max)
        .max(1.0)
        * 1.2;
    let y_max = points
        .iter()
        .map(|p| p.recovery_rate)
        .fold(100.0, f64::max)
        * 1.05;
    let c_max = points.iter().map(|p| p.confirmed).max().unwrap_or(0).max(1) as f64;

    let mut chart = ChartBuilder::on(&root)
        .caption("Mortality Rate vs Recovery Rate by Country", ("sans-serif", 22))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..x_max, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Mortality Rate (%)")
        .y_desc("Recovery Rate (%)")
        .light_line_style(&BLACK.mix(0.05))
        .draw()?;

    chart.draw_series(points.iter().map(|p| {
        let share = p.confirmed as f64 / c_max;
        let radius = (4.0 + 26.0 * share.sqrt()).round() as i32;
        // Hue sweeps purple -> yellow as confirmed grows (viridis-like).
        let fill = HSLColor(0.75 - 0.6 * share, 0.7, 0.45);
        let label = if p.labeled { p.region.clone() } else { String::new() };
        EmptyElement::at((p.mortality_rate, p.recovery_rate))
            + Circle::new((0, 0), radius, fill.mix(0.6).filled())
            + Text::new(label, (radius + 2, -radius / 2), ("sans-serif", 12).into_font())
    }))?;

    root.present()?;
    Ok(())
}
