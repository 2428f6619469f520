//! Formatted terminal output for the analysis and SQL stages.
//!
//! Formatting lives in one place so the aggregation code stays clean and
//! testable, and output changes stay localized.

use crate::report::{DatasetSummary, Insights, RegionTotals};
use crate::store::QueryReport;

/// Format the dataset shape printed after loading the combined table.
pub fn format_dataset_summary(summary: &DatasetSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("Dataset shape: ({}, {})\n", summary.rows, summary.columns));
    out.push_str(&format!(
        "Date range: {} to {}\n",
        summary.first_date, summary.last_date
    ));
    out.push_str(&format!("Countries: {}\n", summary.regions));
    out
}

/// Format the headline insights block.
pub fn format_insights(insights: &Insights) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);

    out.push_str(&format!("{rule}\nCOVID-19 DATA INSIGHTS\n{rule}\n"));
    out.push_str(&format!("Data as of: {}\n", insights.latest_date));
    out.push_str("Global Totals:\n");
    out.push_str(&format!("  Confirmed Cases: {}\n", fmt_count(insights.totals.confirmed)));
    out.push_str(&format!("  Total Deaths: {}\n", fmt_count(insights.totals.deaths)));
    out.push_str(&format!("  Total Recovered: {}\n", fmt_count(insights.totals.recovered)));
    out.push_str(&format!("  Active Cases: {}\n", fmt_count(insights.totals.active)));
    out.push_str(&format!("  Global Mortality Rate: {:.2}%\n", insights.mortality_rate));
    out.push_str(&format!("  Global Recovery Rate: {:.2}%\n", insights.recovery_rate));

    out.push_str(&format!(
        "Top {} Countries by Confirmed Cases:\n",
        insights.top_confirmed.len()
    ));
    for (i, r) in insights.top_confirmed.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {}: {} cases\n",
            i + 1,
            r.region,
            fmt_count(r.totals.confirmed)
        ));
    }

    out.push_str(&format!("Top {} Countries by Deaths:\n", insights.top_deaths.len()));
    for (i, r) in insights.top_deaths.iter().enumerate() {
        out.push_str(&format_death_line(i + 1, r));
    }

    out
}

fn format_death_line(rank: usize, r: &RegionTotals) -> String {
    format!(
        "  {rank}. {}: {} deaths ({:.2}% mortality)\n",
        r.region,
        fmt_count(r.totals.deaths),
        r.mortality_rate
    )
}

/// Format the results of the illustrative SQL queries.
pub fn format_query_report(report: &QueryReport) -> String {
    let mut out = String::new();

    out.push_str("EXAMPLE SQL QUERIES:\n");
    out.push_str(&format!("Available columns: {}\n", report.columns.join(", ")));

    out.push_str(&format!(
        "Top {} Countries by Confirmed Cases:\n",
        report.top_regions.len()
    ));
    for r in &report.top_regions {
        out.push_str(&format!("  {}: {} cases\n", r.region, fmt_count(r.confirmed)));
    }

    out.push_str("Global Totals:\n");
    out.push_str(&format!("  Confirmed: {}\n", fmt_count(report.totals.confirmed)));
    out.push_str(&format!("  Deaths: {}\n", fmt_count(report.totals.deaths)));
    out.push_str(&format!("  Recovered: {}\n", fmt_count(report.totals.recovered)));
    out.push_str(&format!("  Active: {}\n", fmt_count(report.totals.active)));

    out.push_str(&format!("Monthly Growth Trends (first {} months):\n", report.monthly.len()));
    for m in &report.monthly {
        out.push_str(&format!(
            "  {}: {} new cases, {} deaths, {} recovered\n",
            m.month,
            fmt_count(m.new_confirmed),
            fmt_count(m.new_deaths),
            fmt_count(m.new_recovered)
        ));
    }

    out.push_str("Countries with Highest Mortality Rates:\n");
    for m in &report.highest_mortality {
        out.push_str(&format!(
            "  {}: {:.2}% ({} deaths)\n",
            m.region,
            m.mortality_rate,
            fmt_count(m.deaths)
        ));
    }

    out
}

/// Integer with `,` thousands separators.
pub fn fmt_count(v: i64) -> String {
    let digits = v.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if v < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Compact axis label: `1.2M`, `350k`, `12`.
pub fn fmt_compact(v: f64) -> String {
    let a = v.abs();
    if a >= 1e9 {
        format!("{:.1}B", v / 1e9)
    } else if a >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if a >= 1e3 {
        format!("{:.0}k", v / 1e3)
    } else {
        format!("{v:.0}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::report::Totals;
    use crate::store::{MonthlyTrend, MortalityRow, RegionCount};

    #[test]
    fn thousands_separators() {
        assert_eq!(fmt_count(0), "0");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(1000), "1,000");
        assert_eq!(fmt_count(1234567), "1,234,567");
        assert_eq!(fmt_count(-45000), "-45,000");
    }

    #[test]
    fn compact_labels() {
        assert_eq!(fmt_compact(12.0), "12");
        assert_eq!(fmt_compact(35_000.0), "35k");
        assert_eq!(fmt_compact(2_500_000.0), "2.5M");
    }

    #[test]
    fn insights_block_lists_rankings() {
        let totals = Totals { confirmed: 2000, deaths: 40, recovered: 1500, active: 460 };
        let region = RegionTotals {
            region: "Peru".to_string(),
            totals,
            mortality_rate: 2.0,
            recovery_rate: 75.0,
        };
        let insights = Insights {
            latest_date: NaiveDate::from_ymd_opt(2023, 3, 9).unwrap(),
            totals,
            mortality_rate: 2.0,
            recovery_rate: 75.0,
            top_confirmed: vec![region.clone()],
            top_deaths: vec![region],
        };
        let text = format_insights(&insights);
        assert!(text.contains("Data as of: 2023-03-09"));
        assert!(text.contains("Confirmed Cases: 2,000"));
        assert!(text.contains("1. Peru: 2,000 cases"));
        assert!(text.contains("1. Peru: 40 deaths (2.00% mortality)"));
    }

    #[test]
    fn query_report_block() {
        let report = QueryReport {
            columns: vec!["Country/Region".into(), "Date".into()],
            top_regions: vec![RegionCount { region: "US".into(), confirmed: 12_000 }],
            totals: Totals { confirmed: 12_000, deaths: 10, recovered: 5, active: 11_985 },
            monthly: vec![MonthlyTrend {
                month: "2020-01".into(),
                new_confirmed: 1500,
                new_deaths: 2,
                new_recovered: 0,
            }],
            highest_mortality: vec![MortalityRow {
                region: "US".into(),
                confirmed: 12_000,
                deaths: 10,
                mortality_rate: 0.08,
            }],
        };
        let text = format_query_report(&report);
        assert!(text.contains("Available columns: Country/Region, Date"));
        assert!(text.contains("  US: 12,000 cases"));
        assert!(text.contains("  2020-01: 1,500 new cases, 2 deaths, 0 recovered"));
        assert!(text.contains("  US: 0.08% (10 deaths)"));
    }
}
