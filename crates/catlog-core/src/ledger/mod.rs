//! The ledger aggregate and its mutation surface.
//!
//! A [`Ledger`] is the complete financial record for one owner: dated asset
//! snapshots, monthly income and expense tables, free-text memos, and the
//! withdrawal-rate setting used for retirement planning. It is held as a
//! single value that is replaced wholesale on every mutation; callers never
//! patch the persisted representation in place. The persistence layer
//! serializes the whole ledger, splits it into chunks, and rewrites the
//! chunk set.
//!
//! # Canonical serialization
//!
//! Every map in the ledger is a `BTreeMap`, so `serde_json` output is
//! deterministic: the same ledger value always serializes to the same byte
//! sequence. The chunk store relies on this for idempotent writes (writing
//! the same ledger twice produces an identical chunk set) and the codec
//! relies on it for the byte-stable split/join round trip.
//!
//! Field names serialize in `camelCase` (`totalAmount`, `exchangeRate`,
//! `fireSettings`, ...): the ledger's JSON shape is the one format contract
//! this system owns, shared with external backup/import tooling.
//!
//! # Invariants
//!
//! - `incomes[month].total_amount == sum(sources[].amount)`, maintained by
//!   every mutation that touches income sources.
//! - Asset and expense amounts are TWD-normalized integers; the original
//!   foreign-currency amount and the rate used are carried alongside for
//!   display only and are never re-derived here.

mod month;

pub use month::{ParseYearMonthError, YearMonth};

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Classification of an asset position within a daily snapshot.
///
/// `Floating` marks positions whose value moves with the market (stocks,
/// funds, crypto); `Fixed` is everything else (cash, deposits). The split
/// feeds the investment-rate statistic and the range report's per-position
/// delta listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Stable-value position (cash, time deposit, ...).
    #[default]
    Fixed,
    /// Market-valued position (equities, funds, crypto, ...).
    Floating,
}

/// One asset position inside a daily snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    /// Caller-assigned identifier, opaque to the core.
    #[serde(default)]
    pub id: String,

    /// Fixed or floating classification.
    #[serde(rename = "type", default)]
    pub kind: AssetKind,

    /// Display name of the position.
    #[serde(default)]
    pub name: String,

    /// TWD-normalized amount.
    #[serde(default)]
    pub amount: i64,

    /// Currency code of the original position.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Amount in the original currency.
    #[serde(default)]
    pub original_amount: f64,

    /// Exchange rate applied when the entry was recorded.
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: f64,
}

/// One income source within a month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeSource {
    /// Payer (employer, broker, ...).
    #[serde(default)]
    pub company: String,

    /// Receiving bank/account label.
    #[serde(default)]
    pub bank: String,

    /// Currency code of the original payment.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Amount in the original currency.
    #[serde(default)]
    pub original_amount: f64,

    /// Exchange rate applied when the entry was recorded.
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: f64,

    /// TWD-normalized amount.
    #[serde(default)]
    pub amount: i64,

    /// Free-text note.
    #[serde(default)]
    pub memo: String,
}

/// A month of income: the precomputed total plus its sources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomeMonth {
    /// Sum of `sources[].amount`. Kept in lockstep by the mutation surface.
    #[serde(default)]
    pub total_amount: i64,

    /// Individual income sources for the month.
    #[serde(default)]
    pub sources: Vec<IncomeSource>,
}

impl IncomeMonth {
    /// Builds a month record from sources, computing the total.
    #[must_use]
    pub fn from_sources(sources: Vec<IncomeSource>) -> Self {
        let total_amount = sources.iter().map(|s| s.amount).sum();
        Self {
            total_amount,
            sources,
        }
    }
}

/// One expense line item.
///
/// Expense rows are produced by external import only; the core replaces
/// whole months at a time and never edits individual rows. Amounts may be
/// negative: refunds import as credits against the month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseEntry {
    /// Caller-assigned identifier, opaque to the core.
    #[serde(default)]
    pub id: String,

    /// Transaction date.
    pub date: NaiveDate,

    /// Paying account label.
    #[serde(default)]
    pub account: String,

    /// Main category.
    #[serde(default)]
    pub category: String,

    /// Sub-category.
    #[serde(default)]
    pub sub_category: String,

    /// Line-item description.
    #[serde(default)]
    pub name: String,

    /// TWD-normalized amount (negative for credits/refunds).
    #[serde(default)]
    pub amount: i64,

    /// Amount in the original currency.
    #[serde(default)]
    pub original_amount: f64,

    /// Currency code of the original transaction.
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// Retirement-planning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireSettings {
    /// Annual withdrawal rate in percent. Must stay positive; the mutation
    /// surface rejects non-positive or non-finite updates.
    pub withdrawal_rate: f64,
}

/// Default withdrawal rate (the classic 4% rule).
pub const DEFAULT_WITHDRAWAL_RATE: f64 = 4.0;

impl Default for FireSettings {
    fn default() -> Self {
        Self {
            withdrawal_rate: DEFAULT_WITHDRAWAL_RATE,
        }
    }
}

/// The complete financial record for one owner.
///
/// See the [module docs](self) for ownership and serialization rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    /// Asset snapshots keyed by calendar date. A date is absent when no
    /// snapshot was taken that day.
    #[serde(default)]
    pub records: BTreeMap<NaiveDate, Vec<AssetEntry>>,

    /// Free-text notes keyed by calendar date.
    #[serde(default)]
    pub memos: BTreeMap<NaiveDate, String>,

    /// Income tables keyed by month.
    #[serde(default)]
    pub incomes: BTreeMap<YearMonth, IncomeMonth>,

    /// Expense tables keyed by month.
    #[serde(default)]
    pub expenses: BTreeMap<YearMonth, Vec<ExpenseEntry>>,

    /// Retirement-planning settings.
    #[serde(default)]
    pub fire_settings: FireSettings,
}

impl Ledger {
    /// Total TWD amount of one snapshot's entries.
    #[must_use]
    pub fn day_total(entries: &[AssetEntry]) -> i64 {
        entries.iter().map(|e| e.amount).sum()
    }

    /// The chronologically latest snapshot in the ledger, with its total.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<(NaiveDate, i64)> {
        self.records
            .last_key_value()
            .map(|(date, entries)| (*date, Self::day_total(entries)))
    }

    /// Every year that appears anywhere in the ledger, ascending.
    #[must_use]
    pub fn years(&self) -> Vec<i32> {
        let mut years = BTreeSet::new();
        years.extend(self.records.keys().map(Datelike::year));
        years.extend(self.memos.keys().map(Datelike::year));
        years.extend(self.incomes.keys().map(|m| m.year()));
        years.extend(self.expenses.keys().map(|m| m.year()));
        years.into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Mutation surface
    //
    // Each method edits this value in place. The orchestrator clones the
    // authoritative ledger, applies one of these, and swaps the result in
    // as the new authoritative value before persisting it.
    // ------------------------------------------------------------------

    /// Replaces one day's snapshot, memo, and the containing month's income
    /// sources in a single edit (the detail-view save operation).
    pub fn update_day_details(
        &mut self,
        date: NaiveDate,
        assets: Vec<AssetEntry>,
        memo: impl Into<String>,
        sources: Vec<IncomeSource>,
    ) {
        self.records.insert(date, assets);
        self.memos.insert(date, memo.into());
        self.incomes
            .insert(YearMonth::of(date), IncomeMonth::from_sources(sources));
    }

    /// Replaces one day's asset snapshot.
    pub fn update_records(&mut self, date: NaiveDate, assets: Vec<AssetEntry>) {
        self.records.insert(date, assets);
    }

    /// Sets or overwrites one day's memo.
    pub fn update_memo(&mut self, date: NaiveDate, memo: impl Into<String>) {
        self.memos.insert(date, memo.into());
    }

    /// Replaces a month's income sources, recomputing the total.
    pub fn update_income(&mut self, month: YearMonth, sources: Vec<IncomeSource>) {
        self.incomes.insert(month, IncomeMonth::from_sources(sources));
    }

    /// Appends one asset entry to a day's snapshot, creating the snapshot
    /// if the date had none.
    pub fn add_asset(&mut self, date: NaiveDate, entry: AssetEntry) {
        self.records.entry(date).or_default().push(entry);
    }

    /// Appends one income source to a month, growing the total by its amount.
    pub fn add_income(&mut self, month: YearMonth, source: IncomeSource) {
        let record = self.incomes.entry(month).or_default();
        record.total_amount += source.amount;
        record.sources.push(source);
    }

    /// Removes a day's snapshot and memo. Income and expense tables are
    /// month-keyed and untouched.
    pub fn delete_day(&mut self, date: NaiveDate) {
        self.records.remove(&date);
        self.memos.remove(&date);
    }

    /// Whole-month expense replacement: months present in `by_month`
    /// overwrite the stored month, all other months are kept. This is the
    /// landing point for external statement imports.
    pub fn merge_expenses(&mut self, by_month: BTreeMap<YearMonth, Vec<ExpenseEntry>>) {
        self.expenses.extend(by_month);
    }

    /// Updates the withdrawal rate. Non-positive or non-finite rates are
    /// rejected; returns whether the update was applied.
    pub fn set_withdrawal_rate(&mut self, rate: f64) -> bool {
        if rate.is_finite() && rate > 0.0 {
            self.fire_settings.withdrawal_rate = rate;
            true
        } else {
            false
        }
    }
}

fn default_currency() -> String {
    "TWD".to_string()
}

const fn default_exchange_rate() -> f64 {
    1.0
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn asset(name: &str, amount: i64) -> AssetEntry {
        AssetEntry {
            id: String::new(),
            kind: AssetKind::Fixed,
            name: name.to_string(),
            amount,
            currency: "TWD".to_string(),
            original_amount: amount as f64,
            exchange_rate: 1.0,
        }
    }

    fn source(company: &str, amount: i64) -> IncomeSource {
        IncomeSource {
            company: company.to_string(),
            bank: String::new(),
            currency: "TWD".to_string(),
            original_amount: amount as f64,
            exchange_rate: 1.0,
            amount,
            memo: String::new(),
        }
    }

    #[test]
    fn test_default_ledger() {
        let ledger = Ledger::default();
        assert!(ledger.records.is_empty());
        assert!(ledger.incomes.is_empty());
        assert!(ledger.expenses.is_empty());
        assert!(ledger.memos.is_empty());
        assert_eq!(ledger.fire_settings.withdrawal_rate, DEFAULT_WITHDRAWAL_RATE);
    }

    #[test]
    fn test_income_total_invariant_on_replace() {
        let mut ledger = Ledger::default();
        let month: YearMonth = "2024-03".parse().unwrap();

        ledger.update_income(month, vec![source("A", 1000), source("B", 2500)]);
        assert_eq!(ledger.incomes[&month].total_amount, 3500);

        ledger.update_income(month, vec![source("A", 400)]);
        assert_eq!(ledger.incomes[&month].total_amount, 400);
    }

    #[test]
    fn test_income_total_invariant_on_append() {
        let mut ledger = Ledger::default();
        let month: YearMonth = "2024-03".parse().unwrap();

        ledger.add_income(month, source("A", 1000));
        ledger.add_income(month, source("B", 250));

        let record = &ledger.incomes[&month];
        assert_eq!(record.total_amount, 1250);
        assert_eq!(record.sources.len(), 2);
        assert_eq!(
            record.total_amount,
            record.sources.iter().map(|s| s.amount).sum::<i64>()
        );
    }

    #[test]
    fn test_add_asset_appends_to_existing_day() {
        let mut ledger = Ledger::default();
        let day = date("2024-05-01");

        ledger.add_asset(day, asset("bank", 10_000));
        ledger.add_asset(day, asset("broker", 5_000));

        assert_eq!(ledger.records[&day].len(), 2);
        assert_eq!(Ledger::day_total(&ledger.records[&day]), 15_000);
    }

    #[test]
    fn test_delete_day_removes_snapshot_and_memo_only() {
        let mut ledger = Ledger::default();
        let day = date("2024-05-01");
        let month: YearMonth = "2024-05".parse().unwrap();

        ledger.update_records(day, vec![asset("bank", 100)]);
        ledger.update_memo(day, "note");
        ledger.add_income(month, source("A", 1000));

        ledger.delete_day(day);

        assert!(ledger.records.is_empty());
        assert!(ledger.memos.is_empty());
        assert_eq!(ledger.incomes[&month].total_amount, 1000);
    }

    #[test]
    fn test_merge_expenses_overwrites_only_present_months() {
        let mut ledger = Ledger::default();
        let jan: YearMonth = "2024-01".parse().unwrap();
        let feb: YearMonth = "2024-02".parse().unwrap();

        let row = |amount| ExpenseEntry {
            id: String::new(),
            date: date("2024-01-05"),
            account: "cash".to_string(),
            category: "food".to_string(),
            sub_category: String::new(),
            name: String::new(),
            amount,
            original_amount: amount as f64,
            currency: "TWD".to_string(),
        };

        ledger.merge_expenses(BTreeMap::from([
            (jan, vec![row(100)]),
            (feb, vec![row(200)]),
        ]));
        ledger.merge_expenses(BTreeMap::from([(feb, vec![row(300), row(50)])]));

        assert_eq!(ledger.expenses[&jan].len(), 1);
        assert_eq!(ledger.expenses[&feb].len(), 2);
    }

    #[test]
    fn test_withdrawal_rate_rejects_non_positive() {
        let mut ledger = Ledger::default();
        assert!(!ledger.set_withdrawal_rate(0.0));
        assert!(!ledger.set_withdrawal_rate(-3.0));
        assert!(!ledger.set_withdrawal_rate(f64::NAN));
        assert_eq!(ledger.fire_settings.withdrawal_rate, DEFAULT_WITHDRAWAL_RATE);

        assert!(ledger.set_withdrawal_rate(3.5));
        assert_eq!(ledger.fire_settings.withdrawal_rate, 3.5);
    }

    #[test]
    fn test_years_unions_every_table() {
        let mut ledger = Ledger::default();
        ledger.update_records(date("2022-12-31"), vec![asset("bank", 1)]);
        ledger.update_memo(date("2023-01-01"), "memo");
        ledger.add_income("2024-06".parse().unwrap(), source("A", 1));
        ledger.merge_expenses(BTreeMap::from([("2025-01".parse().unwrap(), vec![])]));

        assert_eq!(ledger.years(), vec![2022, 2023, 2024, 2025]);
    }

    #[test]
    fn test_serialization_shape_is_camel_case() {
        let mut ledger = Ledger::default();
        let day = date("2024-01-15");
        ledger.update_records(day, vec![asset("bank", 100_000)]);
        ledger.add_income("2024-01".parse().unwrap(), source("Acme", 50_000));

        let json = serde_json::to_string(&ledger).unwrap();
        assert!(json.contains("\"fireSettings\""));
        assert!(json.contains("\"withdrawalRate\""));
        assert!(json.contains("\"totalAmount\":50000"));
        assert!(json.contains("\"originalAmount\""));
        assert!(json.contains("\"exchangeRate\""));
        assert!(json.contains("\"2024-01-15\""));
        assert!(json.contains("\"type\":\"fixed\""));
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let build = || {
            let mut ledger = Ledger::default();
            ledger.update_records(date("2024-02-01"), vec![asset("b", 2)]);
            ledger.update_records(date("2024-01-01"), vec![asset("a", 1)]);
            ledger.add_income("2024-02".parse().unwrap(), source("B", 2));
            ledger.add_income("2024-01".parse().unwrap(), source("A", 1));
            ledger
        };
        let a = serde_json::to_string(&build()).unwrap();
        let b = serde_json::to_string(&build()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_round_trip_through_json() {
        let mut ledger = Ledger::default();
        ledger.update_day_details(
            date("2024-01-15"),
            vec![asset("bank", 100_000)],
            "first snapshot",
            vec![source("Acme", 50_000)],
        );

        let json = serde_json::to_string(&ledger).unwrap();
        let back: Ledger = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ledger);
    }
}
