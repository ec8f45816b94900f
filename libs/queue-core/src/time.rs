//! Calendar-day scoping and minute rounding

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};

/// Maps instants onto the hospital's local calendar.
///
/// Ticket numbers restart every local calendar day and analytics buckets are keyed
/// by local date and hour, so every scoping decision goes through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarScope {
    offset: FixedOffset,
}

impl Default for CalendarScope {
    fn default() -> Self {
        Self::utc()
    }
}

impl CalendarScope {
    pub fn utc() -> Self {
        Self {
            offset: FixedOffset::east_opt(0).expect("zero offset is valid"),
        }
    }

    /// Build a scope from an offset in minutes east of UTC.
    ///
    /// Returns `None` when the offset is outside +/- 24 hours.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(|offset| Self { offset })
    }

    /// Local calendar day an instant falls on.
    pub fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    /// Local hour (0..=23) an instant falls in.
    pub fn hour_of(&self, instant: DateTime<Utc>) -> u32 {
        instant.with_timezone(&self.offset).hour()
    }

    /// Half-open UTC interval `[start, end)` covering a local calendar day.
    pub fn day_bounds(&self, day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.local_midnight(day);
        (start, start + Duration::days(1))
    }

    /// Half-open UTC interval covering one local hour of a day.
    pub fn hour_bounds(&self, day: NaiveDate, hour: u32) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.local_midnight(day) + Duration::hours(i64::from(hour.min(23)));
        (start, start + Duration::hours(1))
    }

    fn local_midnight(&self, day: NaiveDate) -> DateTime<Utc> {
        let naive = day.and_hms_opt(0, 0, 0).expect("midnight is a valid time");
        // Fixed offsets never produce ambiguous or skipped local times.
        self.offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
    }
}

/// Whole minutes between two instants, rounded half-up and never negative.
pub fn round_minutes(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    let millis = (to - from).num_milliseconds().max(0);
    (millis as f64 / 60_000.0).round() as i32
}
