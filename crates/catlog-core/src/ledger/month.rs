//! Calendar-month key type (`YYYY-MM`).

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A calendar month, the key type for the income and expense tables.
///
/// Serializes as the `YYYY-MM` string the ledger's JSON shape uses for map
/// keys, and orders chronologically, so `BTreeMap<YearMonth, _>` iterates
/// months in calendar order and serializes deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

/// Failure to parse a `YYYY-MM` string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid year-month {input:?}: expected YYYY-MM with month 01-12")]
pub struct ParseYearMonthError {
    /// The rejected input.
    pub input: String,
}

impl YearMonth {
    /// Builds a month key, returning `None` unless `month` is in `1..=12`.
    #[must_use]
    pub const fn new(year: i32, month: u32) -> Option<Self> {
        if month >= 1 && month <= 12 {
            Some(Self { year, month })
        } else {
            None
        }
    }

    /// The month containing `date`.
    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Calendar year.
    #[must_use]
    pub const fn year(self) -> i32 {
        self.year
    }

    /// Month number, `1..=12`.
    #[must_use]
    pub const fn month(self) -> u32 {
        self.month
    }

    /// The preceding calendar month.
    #[must_use]
    pub const fn prev(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The first day of this month.
    ///
    /// # Panics
    ///
    /// Never panics: the month is validated at construction.
    #[must_use]
    pub fn first_day(self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .expect("validated month always has a first day")
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ParseYearMonthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let reject = || ParseYearMonthError {
            input: s.to_string(),
        };

        let (year, month) = s.split_once('-').ok_or_else(reject)?;
        let year: i32 = year.parse().map_err(|_| reject())?;
        let month: u32 = month.parse().map_err(|_| reject())?;
        Self::new(year, month).ok_or_else(reject)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct YearMonthVisitor;

        impl Visitor<'_> for YearMonthVisitor {
            type Value = YearMonth;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a YYYY-MM month string")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                value.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(YearMonthVisitor)
    }
}
