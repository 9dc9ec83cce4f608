//! The 12-month rollup for one calendar year.
//!
//! For each month the rollup resolves an asset total, an income total, an
//! expense total, a balance, and a month-over-month analysis:
//!
//! - **Assets** come from the latest-dated snapshot within the month — when
//!   several snapshots exist, the chronologically last one wins (totals are
//!   never summed across days). A month without a snapshot **carries
//!   forward** the nearest preceding month's total, seeded across the year
//!   boundary from the prior year's year-end total (0 when the prior year
//!   has no snapshot at all).
//! - **Income** and **expense** are direct lookups in the month tables and
//!   do not carry forward: a month with no entry is exactly 0.
//! - **Balance** is `(assets - prev assets) - expense`, where the previous
//!   month's assets are the already-carried-forward figure and January
//!   compares against the prior year's year-end total.
//! - The **composite score** is the income delta plus the asset delta
//!   month-over-month; January's income baseline is the prior year's
//!   December income.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::ledger::{Ledger, YearMonth};
use crate::stats::yearly::year_end_assets;

/// One snapshot day inside a month, with the day's total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthSnapshot {
    /// Snapshot date.
    pub date: NaiveDate,
    /// Total of that day's entries.
    pub total: i64,
}

/// Month-over-month analysis figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonthAnalysis {
    /// Income change versus the previous month.
    pub income_delta: i64,
    /// Asset change versus the previous month (carried-forward figures).
    pub asset_delta: i64,
    /// `income_delta + asset_delta`.
    pub composite_score: i64,
}

/// One month of the rollup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthStat {
    /// Month number, `1..=12`.
    pub month: u32,
    /// Asset total (latest snapshot in the month, or carried forward).
    pub assets: i64,
    /// Income total for the month (0 when absent).
    pub income: i64,
    /// Expense total for the month (0 when absent).
    pub expense: i64,
    /// `(assets - prev assets) - expense`.
    pub balance: i64,
    /// The month's memo, when any day in the month has one (latest wins).
    pub memo: Option<String>,
    /// Whether the month has its own snapshot (false when carried forward).
    pub has_snapshot: bool,
    /// Anchor date for drill-down: the latest snapshot date, else the first
    /// day of the month when only income/expense/memo data exists.
    pub latest_date: Option<NaiveDate>,
    /// Every snapshot day within the month, in date order.
    pub snapshots: Vec<MonthSnapshot>,
    /// Month-over-month analysis.
    pub analysis: MonthAnalysis,
}

impl MonthStat {
    fn empty(month: u32) -> Self {
        Self {
            month,
            assets: 0,
            income: 0,
            expense: 0,
            balance: 0,
            memo: None,
            has_snapshot: false,
            latest_date: None,
            snapshots: Vec::new(),
            analysis: MonthAnalysis::default(),
        }
    }
}

/// Computes the 12-month rollup for `year`.
///
/// Always returns exactly 12 entries, January first.
#[must_use]
pub fn monthly_stats(ledger: &Ledger, year: i32) -> Vec<MonthStat> {
    let mut months: Vec<MonthStat> = (1..=12).map(MonthStat::empty).collect();

    // Snapshot days, grouped by month. BTreeMap iteration is date-ascending,
    // so the last snapshot seen per month is the chronologically latest.
    for (&date, entries) in &ledger.records {
        if date.year() != year {
            continue;
        }
        let stat = &mut months[date.month0() as usize];
        let total = Ledger::day_total(entries);
        stat.snapshots.push(MonthSnapshot { date, total });
        stat.has_snapshot = true;
        stat.assets = total;
        stat.latest_date = Some(date);
    }

    // Carry-forward: months without a snapshot inherit the last known total,
    // seeded from the prior year's year-end figure.
    let mut last_known = year_end_assets(ledger, year - 1);
    for stat in &mut months {
        if stat.has_snapshot {
            last_known = stat.assets;
        } else {
            stat.assets = last_known;
        }
    }

    for (&month, income) in &ledger.incomes {
        if month.year() != year {
            continue;
        }
        let stat = &mut months[(month.month() - 1) as usize];
        stat.income = income.total_amount;
        if stat.latest_date.is_none() {
            stat.latest_date = Some(month.first_day());
        }
    }

    for (&month, entries) in &ledger.expenses {
        if month.year() != year {
            continue;
        }
        let stat = &mut months[(month.month() - 1) as usize];
        stat.expense = entries.iter().map(|e| e.amount).sum();
        if stat.latest_date.is_none() {
            stat.latest_date = Some(month.first_day());
        }
    }

    for (&date, memo) in &ledger.memos {
        if date.year() != year {
            continue;
        }
        let stat = &mut months[date.month0() as usize];
        stat.memo = Some(memo.clone());
        if stat.latest_date.is_none() {
            stat.latest_date = Some(date);
        }
    }

    // Balance and month-over-month analysis. January's baselines are the
    // prior year's year-end assets and the prior year's December income.
    let december = YearMonth::new(year - 1, 12).expect("December is a valid month");
    let mut prev_income = ledger
        .incomes
        .get(&december)
        .map_or(0, |income| income.total_amount);
    let mut prev_assets = year_end_assets(ledger, year - 1);

    for stat in &mut months {
        let income_delta = stat.income - prev_income;
        let asset_delta = stat.assets - prev_assets;
        stat.balance = asset_delta - stat.expense;
        stat.analysis = MonthAnalysis {
            income_delta,
            asset_delta,
            composite_score: income_delta + asset_delta,
        };
        prev_assets = stat.assets;
        prev_income = stat.income;
    }

    months
}
