//! Clock port - 時刻の抽象化
//!
//! - SystemClock（本番用）: ローカルタイムゾーンの「今日」
//! - FixedClock（テスト用）: 任意の時刻に固定・手動で進められる

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate, TimeDelta, Utc};

/// Clock は現在時刻と「今日」を提供
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// The user's notion of today.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock; "today" follows the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually driven clock for tests and demos. "today" is the UTC date.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Fixed at midnight UTC of `date`.
    pub fn on(date: NaiveDate) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN).and_utc())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances_across_midnight() {
        let day = NaiveDate::from_ymd_opt(2025, 11, 3).unwrap();
        let clock = FixedClock::on(day);
        assert_eq!(clock.today(), day);

        clock.advance(TimeDelta::hours(25));
        assert_eq!(clock.today(), day.succ_opt().unwrap());
    }
}
