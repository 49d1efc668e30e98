//! Month keys (`YYYY.MM`) and inclusive month ranges.
//!
//! Keys are kept as the raw strings the store and the caller use. Ordering is
//! lexicographic, which for canonical keys is also chronological. Nothing here
//! normalizes a key: a malformed or day-level bound stays as given and simply
//! never matches a catalog entry.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical key format for one calendar month.
pub const MONTH_KEY_FORMAT: &str = "%Y.%m";

/// One calendar month, as a `YYYY.MM` token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthKey(String);

impl MonthKey {
    /// Wrap a raw key without validating it.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Build the canonical key for a year and month (1-12).
    pub fn from_year_month(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self::from_date)
    }

    fn from_date(date: NaiveDate) -> Self {
        Self(date.format(MONTH_KEY_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First day of the month, if this key is canonical `YYYY.MM`.
    fn first_day(&self) -> Option<NaiveDate> {
        let date = NaiveDate::parse_from_str(&format!("{}.01", self.0), "%Y.%m.%d").ok()?;
        // Round-trip rejects unpadded months, signed years and the like.
        (date.format(MONTH_KEY_FORMAT).to_string() == self.0).then_some(date)
    }

    /// `(year, month)` for a canonical key, `None` otherwise.
    pub fn year_month(&self) -> Option<(i32, u32)> {
        self.first_day().map(|d| (d.year(), d.month()))
    }

    pub fn is_canonical(&self) -> bool {
        self.first_day().is_some()
    }

    /// The following calendar month, rolling over the year.
    pub fn succ(&self) -> Option<Self> {
        self.first_day()?
            .checked_add_months(Months::new(1))
            .map(Self::from_date)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MonthKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MonthKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for MonthKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Inclusive `(start, end)` pair of month keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub start: MonthKey,
    pub end: MonthKey,
}

impl MonthRange {
    pub fn new(start: impl Into<MonthKey>, end: impl Into<MonthKey>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// A range covering exactly one month.
    pub fn single(month: impl Into<MonthKey>) -> Self {
        let month = month.into();
        Self {
            start: month.clone(),
            end: month,
        }
    }

    /// Every month in the range, see [`expected_months`].
    pub fn months(&self) -> Result<Vec<MonthKey>, MonthKey> {
        expected_months(&self.start, &self.end)
    }
}

impl<S: Into<MonthKey>, E: Into<MonthKey>> From<(S, E)> for MonthRange {
    fn from((start, end): (S, E)) -> Self {
        Self::new(start, end)
    }
}

/// Every calendar month from `start` to `end` inclusive, in chronological order.
///
/// Generated purely from the two bounds, independent of any catalog. Empty when
/// `start` is after `end`. A bound that is not a canonical `YYYY.MM` key is
/// returned as the error value, `start` checked first.
pub fn expected_months(start: &MonthKey, end: &MonthKey) -> Result<Vec<MonthKey>, MonthKey> {
    let first = start.first_day().ok_or_else(|| start.clone())?;
    let last = end.first_day().ok_or_else(|| end.clone())?;

    let mut months = Vec::new();
    let mut cursor = first;
    while cursor <= last {
        months.push(MonthKey::from_date(cursor));
        cursor = match cursor.checked_add_months(Months::new(1)) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(months)
}
