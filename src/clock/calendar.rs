//! Civil (calendar) time value used throughout the firmware.
//!
//! Timestamps embedded in samples, ring-store slots and link frames are all
//! local civil time. Conversions to and from epoch seconds go through the
//! `time` crate so leap years, weekdays and ordinals stay correct.

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Number of slots in the daily summary buffer; the date hash is taken
/// modulo this value.
pub const DAILY_SLOTS: usize = 30;

/// A broken-down local timestamp.
///
/// `weekday` counts days since Sunday (0-6), `yearday` is zero-based, both
/// matching the conventions of the link's packed calendar struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalendarTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub weekday: u8,
    pub yearday: u16,
    pub dst: bool,
}

impl CalendarTime {
    /// Build a calendar time from an epoch instant shifted by a fixed local
    /// offset. Weekday and yearday are derived, not trusted from the caller.
    pub fn from_unix_local(unix: i64, offset_secs: i32, dst: bool) -> Self {
        let shifted = unix.saturating_add(offset_secs as i64);
        let odt = OffsetDateTime::from_unix_timestamp(shifted)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Self {
            year: odt.year().clamp(0, u16::MAX as i32) as u16,
            month: u8::from(odt.month()),
            day: odt.day(),
            hour: odt.hour(),
            minute: odt.minute(),
            second: odt.second(),
            weekday: odt.weekday().number_days_from_sunday(),
            yearday: odt.ordinal() - 1,
            dst,
        }
    }

    /// Convenience constructor for fixed timestamps (tests, lookups).
    /// Weekday and yearday are filled in when the date is valid.
    pub fn from_ymd_hms(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        let mut ct = Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            weekday: 0,
            yearday: 0,
            dst: false,
        };
        if let Some(date) = ct.civil_date() {
            ct.weekday = date.weekday().number_days_from_sunday();
            ct.yearday = date.ordinal() - 1;
        }
        ct
    }

    fn civil_date(&self) -> Option<Date> {
        let month = Month::try_from(self.month).ok()?;
        Date::from_calendar_date(self.year as i32, month, self.day).ok()
    }

    /// Epoch seconds treating the stored fields as if they were UTC.
    ///
    /// All stored timestamps share one timezone, so this "naive" epoch is
    /// valid for ordering and age arithmetic between them. Returns `None`
    /// when the fields do not form a real date (e.g. a zeroed slot).
    pub fn naive_unix(&self) -> Option<i64> {
        let date = self.civil_date()?;
        let tod = Time::from_hms(self.hour, self.minute, self.second).ok()?;
        Some(PrimitiveDateTime::new(date, tod).assume_utc().unix_timestamp())
    }

    /// True when both timestamps fall in the same calendar minute.
    pub fn same_minute(&self, other: &Self) -> bool {
        self.year == other.year
            && self.month == other.month
            && self.day == other.day
            && self.hour == other.hour
            && self.minute == other.minute
    }

    /// True when both timestamps fall on the same calendar date.
    pub fn same_date(&self, other: &Self) -> bool {
        self.year == other.year && self.month == other.month && self.day == other.day
    }

    /// The timestamp with the time-of-day cleared, keeping derived fields.
    pub fn date_only(&self) -> Self {
        Self {
            hour: 0,
            minute: 0,
            second: 0,
            ..*self
        }
    }

    /// Slot index of this date in the daily summary buffer.
    ///
    /// Dates more than ~30 days apart can collide; the store resolves a
    /// collision by overwriting with the newer date.
    pub fn daily_slot_index(&self) -> usize {
        ((self.month.saturating_sub(1) as usize) * 31 + self.day as usize) % DAILY_SLOTS
    }

    /// Ordering helper over (year, month, day) only.
    pub fn cmp_date(&self, other: &Self) -> core::cmp::Ordering {
        (self.year, self.month, self.day).cmp(&(other.year, other.month, other.day))
    }
}
