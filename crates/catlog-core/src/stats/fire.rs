//! Retirement-target ("FIRE") statistics.
//!
//! The FIRE target is the asset total needed to sustain the owner's average
//! monthly spend indefinitely at the configured withdrawal rate:
//!
//! ```text
//! target = avg_monthly_expense * 12 / (withdrawal_rate / 100)
//! ```
//!
//! The average is taken over months that actually have expense rows — a
//! month with nothing recorded is unknown, not free, and is excluded from
//! the denominator.

use serde::Serialize;

use crate::ledger::Ledger;
use crate::stats::safe_ratio;

/// The FIRE dashboard figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FireStats {
    /// Withdrawal rate in percent, as configured.
    pub withdrawal_rate: f64,
    /// Average monthly expense over months with recorded rows.
    pub avg_expense: f64,
    /// Target asset total (0 when the rate is non-positive).
    pub fire_target: f64,
    /// Latest snapshot total across the whole ledger, irrespective of year.
    pub current_assets: i64,
    /// `current_assets / fire_target` (0 when the target is 0).
    pub progress: f64,
}

/// Computes the FIRE figures for a ledger snapshot.
#[must_use]
pub fn fire_stats(ledger: &Ledger) -> FireStats {
    let rate = ledger.fire_settings.withdrawal_rate;

    let mut total_expense: i64 = 0;
    let mut recorded_months: u32 = 0;
    for entries in ledger.expenses.values() {
        if entries.is_empty() {
            continue;
        }
        recorded_months += 1;
        total_expense += entries.iter().map(|e| e.amount).sum::<i64>();
    }
    let avg_expense = safe_ratio(total_expense as f64, f64::from(recorded_months));

    let annual_expense = avg_expense * 12.0;
    let fire_target = if rate > 0.0 {
        annual_expense / (rate / 100.0)
    } else {
        0.0
    };

    let current_assets = ledger.latest_snapshot().map_or(0, |(_, total)| total);

    FireStats {
        withdrawal_rate: rate,
        avg_expense,
        fire_target,
        current_assets,
        progress: safe_ratio(current_assets as f64, fire_target),
    }
}

/// One month's spend inside a year breakdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonthAmount {
    /// Month number, `1..=12` (0 for the empty placeholder).
    pub month: u32,
    /// The month's expense total.
    pub total: i64,
}

/// Per-year expense figures backing the FIRE view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FireYearStat {
    /// Calendar year.
    pub year: i32,
    /// Average monthly expense over the year's recorded months.
    pub avg_expense: f64,
    /// The most expensive recorded month.
    pub max: MonthAmount,
    /// The least expensive recorded month.
    pub min: MonthAmount,
}

/// Expense breakdown for every year with recorded rows, most recent first.
#[must_use]
pub fn fire_yearly_stats(ledger: &Ledger) -> Vec<FireYearStat> {
    struct YearAccumulator {
        total: i64,
        months: u32,
        max: MonthAmount,
        min: MonthAmount,
    }

    let mut by_year: Vec<(i32, YearAccumulator)> = Vec::new();
    // Month keys iterate ascending, so years arrive grouped and in order.
    for (month, entries) in &ledger.expenses {
        if entries.is_empty() {
            continue;
        }
        let point = MonthAmount {
            month: month.month(),
            total: entries.iter().map(|e| e.amount).sum(),
        };
        match by_year.last_mut() {
            Some((year, acc)) if *year == month.year() => {
                acc.total += point.total;
                acc.months += 1;
                if point.total > acc.max.total {
                    acc.max = point;
                }
                if point.total < acc.min.total {
                    acc.min = point;
                }
            }
            _ => by_year.push((
                month.year(),
                YearAccumulator {
                    total: point.total,
                    months: 1,
                    max: point,
                    min: point,
                },
            )),
        }
    }

    by_year
        .into_iter()
        .rev()
        .map(|(year, acc)| FireYearStat {
            year,
            avg_expense: safe_ratio(acc.total as f64, f64::from(acc.months)),
            max: acc.max,
            min: acc.min,
        })
        .collect()
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::ledger::{AssetEntry, AssetKind, ExpenseEntry, YearMonth};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn expense_month(ledger: &mut Ledger, month: &str, amounts: &[i64]) {
        let month: YearMonth = month.parse().unwrap();
        let rows = amounts
            .iter()
            .map(|&amount| ExpenseEntry {
                id: String::new(),
                date: month.first_day(),
                account: String::new(),
                category: String::new(),
                sub_category: String::new(),
                name: String::new(),
                amount,
                original_amount: amount as f64,
                currency: "TWD".to_string(),
            })
            .collect();
        ledger.merge_expenses([(month, rows)].into());
    }

    fn snapshot(ledger: &mut Ledger, day: &str, amount: i64) {
        ledger.update_records(
            date(day),
            vec![AssetEntry {
                id: String::new(),
                kind: AssetKind::Fixed,
                name: "cash".to_string(),
                amount,
                currency: "TWD".to_string(),
                original_amount: amount as f64,
                exchange_rate: 1.0,
            }],
        );
    }

    #[test]
    fn test_fire_target_from_average_expense() {
        let mut ledger = Ledger::default();
        expense_month(&mut ledger, "2024-01", &[20_000]);
        expense_month(&mut ledger, "2024-02", &[40_000]);
        snapshot(&mut ledger, "2024-02-28", 1_800_000);

        let stats = fire_stats(&ledger);
        assert!((stats.avg_expense - 30_000.0).abs() < 1e-9);
        // 30k * 12 / 0.04 = 9M
        assert!((stats.fire_target - 9_000_000.0).abs() < 1e-6);
        assert_eq!(stats.current_assets, 1_800_000);
        assert!((stats.progress - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_empty_months_excluded_from_denominator() {
        let mut ledger = Ledger::default();
        expense_month(&mut ledger, "2024-01", &[30_000]);
        expense_month(&mut ledger, "2024-02", &[]);
        expense_month(&mut ledger, "2024-03", &[]);

        let stats = fire_stats(&ledger);
        // One recorded month, not three: the average stays 30k.
        assert!((stats.avg_expense - 30_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_expenses_yields_zero_target_and_progress() {
        let mut ledger = Ledger::default();
        snapshot(&mut ledger, "2024-01-01", 500_000);

        let stats = fire_stats(&ledger);
        assert_eq!(stats.avg_expense, 0.0);
        assert_eq!(stats.fire_target, 0.0);
        assert_eq!(stats.progress, 0.0);
        assert_eq!(stats.current_assets, 500_000);
    }

    #[test]
    fn test_current_assets_is_latest_across_years() {
        let mut ledger = Ledger::default();
        snapshot(&mut ledger, "2023-12-31", 900_000);
        snapshot(&mut ledger, "2022-01-01", 100_000);

        let stats = fire_stats(&ledger);
        assert_eq!(stats.current_assets, 900_000);
    }

    #[test]
    fn test_refunds_reduce_average() {
        let mut ledger = Ledger::default();
        expense_month(&mut ledger, "2024-01", &[10_000, -2_000]);

        let stats = fire_stats(&ledger);
        assert!((stats.avg_expense - 8_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_yearly_breakdown_most_recent_first() {
        let mut ledger = Ledger::default();
        expense_month(&mut ledger, "2023-05", &[1_000]);
        expense_month(&mut ledger, "2024-01", &[2_000]);
        expense_month(&mut ledger, "2024-02", &[6_000]);
        expense_month(&mut ledger, "2024-03", &[4_000]);

        let years = fire_yearly_stats(&ledger);
        assert_eq!(years.len(), 2);

        let y2024 = &years[0];
        assert_eq!(y2024.year, 2024);
        assert!((y2024.avg_expense - 4_000.0).abs() < 1e-9);
        assert_eq!(y2024.max, MonthAmount { month: 2, total: 6_000 });
        assert_eq!(y2024.min, MonthAmount { month: 1, total: 2_000 });

        assert_eq!(years[1].year, 2023);
    }
}
