//! Pure derivation of view statistics from a ledger snapshot.
//!
//! Every function in this module is side-effect free and recomputes its
//! output from scratch on each call: no incremental caches, no mutation of
//! the ledger. The UI layer calls these on demand after every ledger
//! replacement.
//!
//! # Division-by-zero contract
//!
//! Every rate or ratio in these outputs feeds directly into user-facing
//! percentages, so a zero (or otherwise degenerate) denominator yields
//! exactly `0.0`, never `NaN` or an infinity. All ratio computation funnels
//! through [`safe_ratio`] to keep that contract in one place.
//!
//! # Modules
//!
//! - [`monthly`]: the 12-month rollup with carry-forward asset totals,
//!   balances, and month-over-month composite scores.
//! - [`yearly`]: year-end totals, multi-year trend rows, per-year summary
//!   figures, in-year growth, and snapshot extremes.
//! - [`fire`]: retirement-target ("FIRE") statistics and the per-year
//!   expense breakdown behind them.
//! - [`range`]: free date-range reports: income, asset deltas by position,
//!   and expense category totals.

pub mod fire;
pub mod monthly;
pub mod range;
pub mod yearly;

pub use fire::{fire_stats, fire_yearly_stats, FireStats, FireYearStat, MonthAmount};
pub use monthly::{monthly_stats, MonthAnalysis, MonthSnapshot, MonthStat};
pub use range::{
    day_composition, range_report, DayComposition, FloatingChange, RangeAssets, RangeExpenses,
    RangeIncome, RangeIncomeSource, RangeKindDelta, RangeReport,
};
pub use yearly::{
    in_year_growth, snapshot_extremes, year_end_assets, year_summary, yearly_trend, InYearGrowth,
    SnapshotExtreme, SnapshotExtremes, YearSummary, YearTrend,
};

/// `numerator / denominator`, or `0.0` whenever the division is degenerate.
///
/// Returns `0.0` when the denominator is zero or non-finite, and clamps a
/// non-finite quotient to `0.0` as well.
#[must_use]
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    let ratio = numerator / denominator;
    if ratio.is_finite() { ratio } else { 0.0 }
}
