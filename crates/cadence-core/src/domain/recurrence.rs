//! Recurrence rule: how often a task comes back, and which days it may land on.

use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::errors::ValidationError;

/// Unit of the recurrence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Day,
    Week,
    Month,
    /// No automatic schedule; the task becomes due only when triggered.
    Adhoc,
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IntervalUnit::Day => "day",
            IntervalUnit::Week => "week",
            IntervalUnit::Month => "month",
            IntervalUnit::Adhoc => "adhoc",
        };
        f.write_str(s)
    }
}

/// What happens to a missed occurrence when the date rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdueBehavior {
    /// Keep the missed date; the task stays visible as overdue.
    #[default]
    Postpone,
    /// Move the schedule to the next occurrence on or after today.
    SkipToNext,
}

/// Recurrence rule.
///
/// - `quantity == 0` ⇔ `unit == Adhoc`
/// - `specific_days` が空でなければ、その曜日にだけ着地する
/// - `excluded_days` / `excluded_dates` に当たる日は常に飛ばす
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub unit: IntervalUnit,
    pub quantity: u32,

    #[serde(default)]
    pub specific_days: HashSet<Weekday>,

    #[serde(default)]
    pub excluded_days: HashSet<Weekday>,

    #[serde(default)]
    pub excluded_dates: BTreeSet<NaiveDate>,
}

impl RecurrenceRule {
    pub fn new(unit: IntervalUnit, quantity: u32) -> Self {
        Self {
            unit,
            quantity,
            specific_days: HashSet::new(),
            excluded_days: HashSet::new(),
            excluded_dates: BTreeSet::new(),
        }
    }

    pub fn daily() -> Self {
        Self::new(IntervalUnit::Day, 1)
    }

    pub fn weekly() -> Self {
        Self::new(IntervalUnit::Week, 1)
    }

    pub fn monthly() -> Self {
        Self::new(IntervalUnit::Month, 1)
    }

    pub fn adhoc() -> Self {
        Self::new(IntervalUnit::Adhoc, 0)
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.specific_days.extend(days);
        self
    }

    pub fn excluding_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.excluded_days.extend(days);
        self
    }

    pub fn excluding_dates(mut self, dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        self.excluded_dates.extend(dates);
        self
    }

    pub fn is_adhoc(&self) -> bool {
        self.unit == IntervalUnit::Adhoc
    }

    /// `quantity == 0` iff the rule is ad hoc.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_adhoc() != (self.quantity == 0) {
            return Err(ValidationError::InvalidInterval {
                unit: self.unit,
                quantity: self.quantity,
            });
        }
        Ok(())
    }

    /// Does `date` match the weekday constraint (if any)?
    pub fn matches_specific_day(&self, date: NaiveDate) -> bool {
        self.specific_days.is_empty() || self.specific_days.contains(&date.weekday())
    }

    /// Is `date` excluded, either by weekday or by exact date?
    pub fn is_excluded(&self, date: NaiveDate) -> bool {
        self.excluded_days.contains(&date.weekday()) || self.excluded_dates.contains(&date)
    }
}

impl Default for RecurrenceRule {
    fn default() -> Self {
        Self::daily()
    }
}
