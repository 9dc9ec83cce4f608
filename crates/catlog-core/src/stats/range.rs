//! Free date-range reports and snapshot composition.
//!
//! The range report answers "what happened between these two dates":
//! income received, how the asset base moved (split by fixed/floating and
//! broken down per floating position), and where the money went by expense
//! category. Asset movement compares the last snapshot at-or-before the
//! range start against the last snapshot at-or-before the range end, so a
//! range that starts mid-gap still anchors on real data.

use chrono::NaiveDate;
use serde::Serialize;

use crate::ledger::{AssetEntry, AssetKind, IncomeSource, Ledger, YearMonth};
use crate::stats::safe_ratio;

/// Label used to bucket expense rows that carry no category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Fixed/floating composition of one snapshot day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DayComposition {
    /// Total of all entries.
    pub total: i64,
    /// Sum of fixed-kind entries.
    pub fixed: i64,
    /// Sum of floating-kind entries.
    pub floating: i64,
    /// `floating / total` (0 when the total is 0).
    pub investment_rate: f64,
}

/// Computes the fixed/floating composition of one snapshot's entries.
#[must_use]
pub fn day_composition(entries: &[AssetEntry]) -> DayComposition {
    let mut fixed = 0;
    let mut floating = 0;
    for entry in entries {
        match entry.kind {
            AssetKind::Fixed => fixed += entry.amount,
            AssetKind::Floating => floating += entry.amount,
        }
    }
    let total = fixed + floating;
    DayComposition {
        total,
        fixed,
        floating,
        investment_rate: safe_ratio(floating as f64, total as f64),
    }
}

/// One income source inside a range report, tagged with its month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangeIncomeSource {
    /// The month the source belongs to.
    pub month: YearMonth,
    /// The source record.
    pub source: IncomeSource,
}

/// Income received within a range (month granularity).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeIncome {
    /// Sum of the in-range months' totals.
    pub total: i64,
    /// Every source from the in-range months, in month order.
    pub sources: Vec<RangeIncomeSource>,
}

/// Start/end/delta triple for one asset kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RangeKindDelta {
    /// Total at the range start anchor.
    pub start: i64,
    /// Total at the range end anchor.
    pub end: i64,
    /// `end - start`.
    pub change: i64,
}

/// Movement of one floating position across the range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FloatingChange {
    /// Position name.
    pub name: String,
    /// Amount at the start anchor (0 when absent).
    pub start: i64,
    /// Amount at the end anchor (0 when absent).
    pub end: i64,
    /// `end - start`.
    pub change: i64,
}

/// Asset movement within a range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeAssets {
    /// The snapshot date anchoring the range start, when one exists.
    pub start_date: Option<NaiveDate>,
    /// The snapshot date anchoring the range end, when one exists.
    pub end_date: Option<NaiveDate>,
    /// Total at the start anchor.
    pub start_total: i64,
    /// Total at the end anchor.
    pub end_total: i64,
    /// `end_total - start_total`.
    pub change: i64,
    /// Fixed-kind movement.
    pub fixed: RangeKindDelta,
    /// Floating-kind movement.
    pub floating: RangeKindDelta,
    /// Per-position floating deltas, largest absolute change first.
    /// Positions with no movement are omitted.
    pub floating_changes: Vec<FloatingChange>,
}

/// Expense totals within a range.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeExpenses {
    /// Sum of in-range rows.
    pub total: i64,
    /// Number of in-range rows.
    pub count: usize,
    /// Top categories by spend, descending, at most five.
    pub top_categories: Vec<(String, i64)>,
}

/// The full range report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeReport {
    /// Income received within the range.
    pub income: RangeIncome,
    /// Asset movement across the range.
    pub assets: RangeAssets,
    /// Spending within the range.
    pub expenses: RangeExpenses,
}

/// Builds the report for the inclusive date range `start..=end`.
#[must_use]
pub fn range_report(ledger: &Ledger, start: NaiveDate, end: NaiveDate) -> RangeReport {
    RangeReport {
        income: income_in_range(ledger, start, end),
        assets: assets_in_range(ledger, start, end),
        expenses: expenses_in_range(ledger, start, end),
    }
}

fn income_in_range(ledger: &Ledger, start: NaiveDate, end: NaiveDate) -> RangeIncome {
    let start_month = YearMonth::of(start);
    let end_month = YearMonth::of(end);

    let mut report = RangeIncome::default();
    for (&month, income) in ledger.incomes.range(start_month..=end_month) {
        report.total += income.total_amount;
        report
            .sources
            .extend(income.sources.iter().cloned().map(|source| {
                RangeIncomeSource { month, source }
            }));
    }
    report
}

fn assets_in_range(ledger: &Ledger, start: NaiveDate, end: NaiveDate) -> RangeAssets {
    // Last snapshot at-or-before each boundary.
    let anchor = |boundary: NaiveDate| {
        ledger
            .records
            .range(..=boundary)
            .next_back()
            .map(|(date, entries)| (*date, entries.as_slice()))
    };
    let start_anchor = anchor(start);
    let end_anchor = anchor(end);

    let start_entries = start_anchor.map_or(&[][..], |(_, entries)| entries);
    let end_entries = end_anchor.map_or(&[][..], |(_, entries)| entries);

    let start_comp = day_composition(start_entries);
    let end_comp = day_composition(end_entries);

    // Per-position floating deltas, matched by name.
    let floating_amounts = |entries: &[AssetEntry]| {
        let mut amounts: Vec<(String, i64)> = Vec::new();
        for entry in entries {
            if entry.kind == AssetKind::Floating {
                match amounts.iter_mut().find(|(name, _)| *name == entry.name) {
                    Some((_, amount)) => *amount += entry.amount,
                    None => amounts.push((entry.name.clone(), entry.amount)),
                }
            }
        }
        amounts
    };
    let start_floating = floating_amounts(start_entries);
    let end_floating = floating_amounts(end_entries);

    let mut floating_changes: Vec<FloatingChange> = Vec::new();
    let lookup = |list: &[(String, i64)], name: &str| {
        list.iter()
            .find(|(n, _)| n == name)
            .map_or(0, |(_, amount)| *amount)
    };
    for (name, start_amount) in &start_floating {
        let end_amount = lookup(&end_floating, name);
        if end_amount != *start_amount {
            floating_changes.push(FloatingChange {
                name: name.clone(),
                start: *start_amount,
                end: end_amount,
                change: end_amount - start_amount,
            });
        }
    }
    for (name, end_amount) in &end_floating {
        let is_new = !start_floating.iter().any(|(n, _)| n == name);
        if is_new && *end_amount != 0 {
            floating_changes.push(FloatingChange {
                name: name.clone(),
                start: 0,
                end: *end_amount,
                change: *end_amount,
            });
        }
    }
    floating_changes.sort_by_key(|change| std::cmp::Reverse(change.change.abs()));

    RangeAssets {
        start_date: start_anchor.map(|(date, _)| date),
        end_date: end_anchor.map(|(date, _)| date),
        start_total: start_comp.total,
        end_total: end_comp.total,
        change: end_comp.total - start_comp.total,
        fixed: RangeKindDelta {
            start: start_comp.fixed,
            end: end_comp.fixed,
            change: end_comp.fixed - start_comp.fixed,
        },
        floating: RangeKindDelta {
            start: start_comp.floating,
            end: end_comp.floating,
            change: end_comp.floating - start_comp.floating,
        },
        floating_changes,
    }
}

fn expenses_in_range(ledger: &Ledger, start: NaiveDate, end: NaiveDate) -> RangeExpenses {
    let mut total = 0;
    let mut count = 0;
    let mut categories: Vec<(String, i64)> = Vec::new();

    for entries in ledger.expenses.values() {
        for entry in entries {
            if entry.date < start || entry.date > end {
                continue;
            }
            total += entry.amount;
            count += 1;
            let label = if entry.category.is_empty() {
                UNCATEGORIZED
            } else {
                entry.category.as_str()
            };
            match categories.iter_mut().find(|(name, _)| name == label) {
                Some((_, amount)) => *amount += entry.amount,
                None => categories.push((label.to_string(), entry.amount)),
            }
        }
    }

    categories.sort_by_key(|(_, amount)| std::cmp::Reverse(*amount));
    categories.truncate(5);

    RangeExpenses {
        total,
        count,
        top_categories: categories,
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::ledger::ExpenseEntry;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn entry(kind: AssetKind, name: &str, amount: i64) -> AssetEntry {
        AssetEntry {
            id: String::new(),
            kind,
            name: name.to_string(),
            amount,
            currency: "TWD".to_string(),
            original_amount: amount as f64,
            exchange_rate: 1.0,
        }
    }

    fn expense(day: &str, category: &str, amount: i64) -> ExpenseEntry {
        ExpenseEntry {
            id: String::new(),
            date: date(day),
            account: String::new(),
            category: category.to_string(),
            sub_category: String::new(),
            name: String::new(),
            amount,
            original_amount: amount as f64,
            currency: "TWD".to_string(),
        }
    }

    fn income_source(amount: i64) -> IncomeSource {
        IncomeSource {
            company: "Acme".to_string(),
            bank: String::new(),
            currency: "TWD".to_string(),
            original_amount: amount as f64,
            exchange_rate: 1.0,
            amount,
            memo: String::new(),
        }
    }

    #[test]
    fn test_day_composition_investment_rate() {
        let comp = day_composition(&[
            entry(AssetKind::Fixed, "cash", 600),
            entry(AssetKind::Floating, "etf", 400),
        ]);
        assert_eq!(comp.total, 1000);
        assert_eq!(comp.fixed, 600);
        assert_eq!(comp.floating, 400);
        assert!((comp.investment_rate - 0.4).abs() < 1e-12);

        assert_eq!(day_composition(&[]).investment_rate, 0.0);
    }

    #[test]
    fn test_income_in_range_is_month_granular() {
        let mut ledger = Ledger::default();
        ledger.update_income("2024-01".parse().unwrap(), vec![income_source(100)]);
        ledger.update_income("2024-02".parse().unwrap(), vec![income_source(200)]);
        ledger.update_income("2024-03".parse().unwrap(), vec![income_source(400)]);

        // Mid-month boundaries still include the whole boundary months.
        let report = range_report(&ledger, date("2024-01-15"), date("2024-02-10"));
        assert_eq!(report.income.total, 300);
        assert_eq!(report.income.sources.len(), 2);
        assert_eq!(report.income.sources[0].month.to_string(), "2024-01");
    }

    #[test]
    fn test_asset_anchors_use_last_snapshot_at_or_before() {
        let mut ledger = Ledger::default();
        ledger.update_records(date("2024-01-05"), vec![entry(AssetKind::Fixed, "cash", 100)]);
        ledger.update_records(date("2024-03-05"), vec![entry(AssetKind::Fixed, "cash", 250)]);

        let report = range_report(&ledger, date("2024-02-01"), date("2024-04-01"));
        assert_eq!(report.assets.start_date, Some(date("2024-01-05")));
        assert_eq!(report.assets.end_date, Some(date("2024-03-05")));
        assert_eq!(report.assets.start_total, 100);
        assert_eq!(report.assets.end_total, 250);
        assert_eq!(report.assets.change, 150);
    }

    #[test]
    fn test_no_snapshot_before_start() {
        let mut ledger = Ledger::default();
        ledger.update_records(date("2024-06-01"), vec![entry(AssetKind::Fixed, "cash", 80)]);

        let report = range_report(&ledger, date("2024-01-01"), date("2024-12-31"));
        assert_eq!(report.assets.start_date, None);
        assert_eq!(report.assets.start_total, 0);
        assert_eq!(report.assets.end_total, 80);
    }

    #[test]
    fn test_floating_changes_sorted_by_magnitude() {
        let mut ledger = Ledger::default();
        ledger.update_records(
            date("2024-01-01"),
            vec![
                entry(AssetKind::Floating, "etf", 1000),
                entry(AssetKind::Floating, "coin", 500),
                entry(AssetKind::Floating, "flat", 300),
            ],
        );
        ledger.update_records(
            date("2024-06-30"),
            vec![
                entry(AssetKind::Floating, "etf", 1100),
                entry(AssetKind::Floating, "coin", 2000),
                entry(AssetKind::Floating, "flat", 300),
                entry(AssetKind::Floating, "new", 50),
            ],
        );

        let report = range_report(&ledger, date("2024-01-01"), date("2024-12-31"));
        let changes = &report.assets.floating_changes;
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].name, "coin");
        assert_eq!(changes[0].change, 1500);
        assert_eq!(changes[1].name, "etf");
        assert_eq!(changes[1].change, 100);
        assert_eq!(changes[2].name, "new");
        assert_eq!(changes[2].change, 50);
    }

    #[test]
    fn test_expense_categories_top_five() {
        let mut ledger = Ledger::default();
        let rows = vec![
            expense("2024-01-02", "food", 300),
            expense("2024-01-03", "food", 200),
            expense("2024-01-04", "rent", 9000),
            expense("2024-01-05", "fun", 150),
            expense("2024-01-06", "travel", 800),
            expense("2024-01-07", "books", 120),
            expense("2024-01-08", "medical", 90),
            expense("2024-01-09", "", 60),
        ];
        ledger.merge_expenses([("2024-01".parse().unwrap(), rows)].into());

        let report = range_report(&ledger, date("2024-01-01"), date("2024-01-31"));
        assert_eq!(report.expenses.count, 8);
        assert_eq!(report.expenses.total, 10_720);
        assert_eq!(report.expenses.top_categories.len(), 5);
        assert_eq!(report.expenses.top_categories[0], ("rent".to_string(), 9000));
        assert_eq!(report.expenses.top_categories[1], ("travel".to_string(), 800));
    }

    #[test]
    fn test_expense_rows_outside_range_excluded() {
        let mut ledger = Ledger::default();
        let rows = vec![
            expense("2024-01-02", "food", 100),
            expense("2024-01-20", "food", 100),
        ];
        ledger.merge_expenses([("2024-01".parse().unwrap(), rows)].into());

        let report = range_report(&ledger, date("2024-01-01"), date("2024-01-10"));
        assert_eq!(report.expenses.count, 1);
        assert_eq!(report.expenses.total, 100);
    }
}
