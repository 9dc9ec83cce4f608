//! Year-level statistics: year-end totals, multi-year trend, per-year
//! summary figures, in-year growth, and snapshot extremes.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::ledger::Ledger;
use crate::stats::safe_ratio;

/// The asset total of the chronologically latest snapshot within `year`,
/// or 0 when the year has no snapshot.
#[must_use]
pub fn year_end_assets(ledger: &Ledger, year: i32) -> i64 {
    ledger
        .records
        .iter()
        .filter(|(date, _)| date.year() == year)
        .next_back()
        .map_or(0, |(_, entries)| Ledger::day_total(entries))
}

/// Total recorded income for `year`.
#[must_use]
pub fn year_total_income(ledger: &Ledger, year: i32) -> i64 {
    ledger
        .incomes
        .iter()
        .filter(|(month, _)| month.year() == year)
        .map(|(_, income)| income.total_amount)
        .sum()
}

/// Total recorded income across the whole ledger.
#[must_use]
pub fn lifetime_income(ledger: &Ledger) -> i64 {
    ledger
        .incomes
        .values()
        .map(|income| income.total_amount)
        .sum()
}

/// One row of the multi-year trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearTrend {
    /// Calendar year.
    pub year: i32,
    /// Year-end asset total.
    pub assets: i64,
    /// This year's income over last year's (0 when last year had none).
    pub income_growth: f64,
    /// This year's income over lifetime income (0 when lifetime is 0).
    pub income_share: f64,
}

/// Trend rows for every year present in the ledger, ascending by year.
#[must_use]
pub fn yearly_trend(ledger: &Ledger) -> Vec<YearTrend> {
    let lifetime = lifetime_income(ledger) as f64;
    ledger
        .years()
        .into_iter()
        .map(|year| {
            let income = year_total_income(ledger, year) as f64;
            let last_year_income = year_total_income(ledger, year - 1) as f64;
            YearTrend {
                year,
                assets: year_end_assets(ledger, year),
                income_growth: safe_ratio(income, last_year_income),
                income_share: safe_ratio(income, lifetime),
            }
        })
        .collect()
}

/// Summary figures for one year's dashboard header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearSummary {
    /// Total income for the year.
    pub total_income: i64,
    /// Total income for the preceding year.
    pub last_year_income: i64,
    /// Average monthly income (total over all 12 months).
    pub avg_income: f64,
    /// This year's income over last year's (0 when last year had none).
    pub income_yoy_ratio: f64,
    /// This year's income over lifetime income (0 when lifetime is 0).
    pub income_share: f64,
    /// Lifetime income across the whole ledger.
    pub lifetime_income: i64,
    /// Year-end asset total.
    pub year_end_assets: i64,
    /// Prior year's year-end asset total.
    pub last_year_end_assets: i64,
    /// `year_end_assets - last_year_end_assets`.
    pub asset_growth_amount: i64,
    /// Asset growth over last year's base (0 when the base is 0).
    pub asset_growth_rate: f64,
    /// `year_end_assets / last_year_end_assets` (0 when the base is 0).
    pub asset_growth_ratio: f64,
}

/// Computes the dashboard summary for `year`.
#[must_use]
pub fn year_summary(ledger: &Ledger, year: i32) -> YearSummary {
    let total_income = year_total_income(ledger, year);
    let last_year_income = year_total_income(ledger, year - 1);
    let lifetime = lifetime_income(ledger);
    let assets = year_end_assets(ledger, year);
    let last_assets = year_end_assets(ledger, year - 1);
    let growth = assets - last_assets;

    YearSummary {
        total_income,
        last_year_income,
        avg_income: total_income as f64 / 12.0,
        income_yoy_ratio: safe_ratio(total_income as f64, last_year_income as f64),
        income_share: safe_ratio(total_income as f64, lifetime as f64),
        lifetime_income: lifetime,
        year_end_assets: assets,
        last_year_end_assets: last_assets,
        asset_growth_amount: growth,
        asset_growth_rate: safe_ratio(growth as f64, last_assets as f64),
        asset_growth_ratio: safe_ratio(assets as f64, last_assets as f64),
    }
}

/// Asset growth between the first and last snapshot within one year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct InYearGrowth {
    /// `last snapshot total - first snapshot total`.
    pub amount: i64,
    /// Growth over the first snapshot's total (0 when that base is 0).
    pub rate: f64,
}

/// First-to-last snapshot growth within `year`. Zero when the year has
/// fewer than two snapshot days.
#[must_use]
pub fn in_year_growth(ledger: &Ledger, year: i32) -> InYearGrowth {
    let mut in_year = ledger
        .records
        .iter()
        .filter(|(date, _)| date.year() == year);

    let Some((_, first_entries)) = in_year.next() else {
        return InYearGrowth::default();
    };
    let Some((_, last_entries)) = in_year.next_back() else {
        return InYearGrowth::default();
    };

    let start = Ledger::day_total(first_entries);
    let end = Ledger::day_total(last_entries);
    InYearGrowth {
        amount: end - start,
        rate: safe_ratio((end - start) as f64, start as f64),
    }
}

/// One extreme snapshot day within a year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotExtreme {
    /// Month number of the extreme, `1..=12` (0 when the year is empty).
    pub month: u32,
    /// The day's total.
    pub total: i64,
}

/// Highest and lowest single-day totals within a year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotExtremes {
    /// The highest snapshot day.
    pub max: SnapshotExtreme,
    /// The lowest snapshot day.
    pub min: SnapshotExtreme,
}

/// Finds the extreme snapshot days within `year`. Both extremes are the
/// zero value when the year has no snapshot.
#[must_use]
pub fn snapshot_extremes(ledger: &Ledger, year: i32) -> SnapshotExtremes {
    let mut extremes: Option<SnapshotExtremes> = None;
    for (date, entries) in ledger
        .records
        .iter()
        .filter(|(date, _): &(&NaiveDate, _)| date.year() == year)
    {
        let point = SnapshotExtreme {
            month: date.month(),
            total: Ledger::day_total(entries),
        };
        let current = extremes.get_or_insert(SnapshotExtremes {
            max: point,
            min: point,
        });
        if point.total > current.max.total {
            current.max = point;
        }
        if point.total < current.min.total {
            current.min = point;
        }
    }
    extremes.unwrap_or_default()
}
