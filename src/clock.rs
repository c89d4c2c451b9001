use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, Offset, TimeZone, Utc};

pub const DAY_MS: i64 = 86_400_000;

/// Source of "now" and of the caller's local calendar
pub trait Clock {
    /// Current instant in epoch milliseconds
    fn now_ms(&self) -> i64;

    /// Local calendar day containing `ts_ms`
    fn local_day(&self, ts_ms: i64) -> NaiveDate;

    /// Epoch milliseconds of local midnight starting `day`
    fn local_midnight_ms(&self, day: NaiveDate) -> i64;

    fn today(&self) -> NaiveDate {
        self.local_day(self.now_ms())
    }
}

/// Production clock: wall time in the process's local timezone
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn local_day(&self, ts_ms: i64) -> NaiveDate {
        day_in(&Local, ts_ms)
    }

    fn local_midnight_ms(&self, day: NaiveDate) -> i64 {
        midnight_in(&Local, day)
    }
}

/// Frozen clock with a fixed UTC offset, for deterministic rollups
#[derive(Clone, Copy, Debug)]
pub struct FixedClock {
    now_ms: i64,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now_ms: i64, offset: FixedOffset) -> Self {
        Self { now_ms, offset }
    }

    pub fn utc(now_ms: i64) -> Self {
        Self::new(now_ms, Utc.fix())
    }

    /// Clock frozen at `hour:00` local time on `day`.
    pub fn at(day: NaiveDate, hour: u32, offset: FixedOffset) -> Self {
        let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
        let now_ms = offset
            .from_local_datetime(&day.and_time(time))
            .earliest()
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_default();
        Self::new(now_ms, offset)
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now_ms
    }

    fn local_day(&self, ts_ms: i64) -> NaiveDate {
        day_in(&self.offset, ts_ms)
    }

    fn local_midnight_ms(&self, day: NaiveDate) -> i64 {
        midnight_in(&self.offset, day)
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> i64 {
        (**self).now_ms()
    }

    fn local_day(&self, ts_ms: i64) -> NaiveDate {
        (**self).local_day(ts_ms)
    }

    fn local_midnight_ms(&self, day: NaiveDate) -> i64 {
        (**self).local_midnight_ms(day)
    }
}

/// Epoch milliseconds that chrono can represent as an instant.
pub fn instant(ts_ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ts_ms)
}

fn day_in<Tz: TimeZone>(tz: &Tz, ts_ms: i64) -> NaiveDate {
    instant(ts_ms)
        .map(|dt| dt.with_timezone(tz).date_naive())
        .unwrap_or(NaiveDate::MIN)
}

fn midnight_in<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> i64 {
    // Some zones skip midnight on DST days; take the first instant of the day.
    (0..24)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .find_map(|time| tz.from_local_datetime(&day.and_time(time)).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|| day.and_time(NaiveTime::MIN).and_utc().timestamp_millis())
}

/// Whole days between two instants, floored, never negative.
pub fn days_between(earlier_ms: i64, later_ms: i64) -> i64 {
    (later_ms - earlier_ms).div_euclid(DAY_MS).max(0)
}
