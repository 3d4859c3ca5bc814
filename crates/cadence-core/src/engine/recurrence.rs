//! Recurrence calculator: decides the next due date of a rule.
//!
//! Pure and deterministic. The bounded searches never fail; when a bound is
//! exhausted the unmodified candidate is used and the fallback is reported
//! as a `SchedulingConflict` on the returned `Schedule`.

use chrono::{Datelike, Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{IntervalUnit, RecurrenceRule, SchedulingConflict};

/// Bounds of the two date searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// How many days to scan for a weekday from `specific_days`.
    pub weekday_window_days: u32,
    /// How many single-day steps to take past excluded dates.
    pub exclusion_limit: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            weekday_window_days: 7,
            exclusion_limit: 365,
        }
    }
}

/// A computed due date, plus the fallback that produced it (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub date: NaiveDate,
    pub conflict: Option<SchedulingConflict>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecurrenceCalculator {
    limits: SearchLimits,
}

impl RecurrenceCalculator {
    pub fn new(limits: SearchLimits) -> Self {
        Self { limits }
    }

    /// Next due date after completing on `reference`. `None` for ad hoc rules.
    pub fn next_due(&self, rule: &RecurrenceRule, reference: NaiveDate) -> Option<NaiveDate> {
        self.schedule(rule, reference).map(|s| s.date)
    }

    /// Same as [`next_due`](Self::next_due), keeping the fallback report.
    ///
    /// # Steps
    /// 1. ad hoc -> `None`
    /// 2. advance `quantity` units from `reference`
    /// 3. land on a weekday from `specific_days` (weekly rules search the rest
    ///    of the reference week first, so Mon/Wed/Fri goes Mon -> Wed)
    /// 4. step past excluded weekdays / dates
    pub fn schedule(&self, rule: &RecurrenceRule, reference: NaiveDate) -> Option<Schedule> {
        let candidate = advance(rule.unit, rule.quantity, reference)?;

        let (aligned, conflict) = if rule.specific_days.is_empty() {
            (candidate, None)
        } else {
            let found = match rule.unit {
                IntervalUnit::Week => self.weekly_specific_day(rule, reference),
                _ => self.scan_specific_day(rule, candidate),
            };
            match found {
                Some(date) => (date, None),
                None => (candidate, Some(SchedulingConflict::NoMatchingWeekday)),
            }
        };

        Some(self.skip_exclusions(rule, aligned, conflict))
    }

    /// First occurrence of a new task, on or after `today`. `None` for ad hoc rules.
    pub fn first_due(&self, rule: &RecurrenceRule, today: NaiveDate) -> Option<Schedule> {
        if rule.is_adhoc() {
            return None;
        }
        let (aligned, conflict) = match self.scan_specific_day(rule, today) {
            Some(date) => (date, None),
            None => (today, Some(SchedulingConflict::NoMatchingWeekday)),
        };
        Some(self.skip_exclusions(rule, aligned, conflict))
    }

    /// First date in `[from, from + window)` matching `specific_days`.
    fn scan_specific_day(&self, rule: &RecurrenceRule, from: NaiveDate) -> Option<NaiveDate> {
        (0..self.limits.weekday_window_days)
            .filter_map(|offset| from.checked_add_days(Days::new(offset.into())))
            .find(|date| rule.matches_specific_day(*date))
    }

    /// Rest of the reference week (Mon..Sun) first, then the week `quantity`
    /// weeks later, starting Monday.
    fn weekly_specific_day(
        &self,
        rule: &RecurrenceRule,
        reference: NaiveDate,
    ) -> Option<NaiveDate> {
        let days_left = 6 - reference.weekday().num_days_from_monday();
        let this_week = (1..=days_left)
            .filter_map(|offset| reference.checked_add_days(Days::new(offset.into())))
            .find(|date| rule.matches_specific_day(*date));
        if this_week.is_some() {
            return this_week;
        }

        let monday = reference.checked_sub_days(Days::new(
            reference.weekday().num_days_from_monday().into(),
        ))?;
        let target_week = monday.checked_add_days(Days::new(7 * u64::from(rule.quantity)))?;
        self.scan_specific_day(rule, target_week)
    }

    fn skip_exclusions(
        &self,
        rule: &RecurrenceRule,
        candidate: NaiveDate,
        conflict: Option<SchedulingConflict>,
    ) -> Schedule {
        let mut date = candidate;
        for _ in 0..=self.limits.exclusion_limit {
            if !rule.is_excluded(date) {
                return Schedule { date, conflict };
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        Schedule {
            date: candidate,
            conflict: Some(SchedulingConflict::ExclusionsExhausted),
        }
    }
}

/// `reference` + `quantity` units. Month steps clamp to the month's last day.
fn advance(unit: IntervalUnit, quantity: u32, reference: NaiveDate) -> Option<NaiveDate> {
    match unit {
        IntervalUnit::Adhoc => None,
        IntervalUnit::Day => reference.checked_add_days(Days::new(quantity.into())),
        IntervalUnit::Week => reference.checked_add_days(Days::new(7 * u64::from(quantity))),
        IntervalUnit::Month => reference.checked_add_months(Months::new(quantity)),
    }
}

/// Next due date with the default search limits.
pub fn next_due(rule: &RecurrenceRule, reference: NaiveDate) -> Option<NaiveDate> {
    RecurrenceCalculator::default().next_due(rule, reference)
}
