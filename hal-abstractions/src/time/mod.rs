//! Wall-clock timestamp shared by the clock, storage and logger layers
//!
//! A `Timestamp` always satisfies the logger's calendar ranges:
//! year 2000-2100, month 1-12, day 1-31, hour 0-23, minute 0-59, second 0-59.
//! Day-of-month is not checked against the month length.

mod calendar;

use core::fmt;

use calendar::{days_from_civil, weekday_from_days};

/// Lowest accepted year
pub const MIN_YEAR: u16 = 2000;
/// Highest accepted year
pub const MAX_YEAR: u16 = 2100;

const SECONDS_PER_DAY: u64 = 86_400;

/// Which field of a candidate timestamp fell outside its range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeError {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year => write!(f, "year out of range"),
            Self::Month => write!(f, "month out of range"),
            Self::Day => write!(f, "day out of range"),
            Self::Hour => write!(f, "hour out of range"),
            Self::Minute => write!(f, "minute out of range"),
            Self::Second => write!(f, "second out of range"),
        }
    }
}

impl core::error::Error for RangeError {}

/// Calendar date and time with one-second resolution, UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl Timestamp {
    /// Build a timestamp, rejecting any field outside its range
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, RangeError> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(RangeError::Year);
        }
        if !(1..=12).contains(&month) {
            return Err(RangeError::Month);
        }
        if !(1..=31).contains(&day) {
            return Err(RangeError::Day);
        }
        if hour > 23 {
            return Err(RangeError::Hour);
        }
        if minute > 59 {
            return Err(RangeError::Minute);
        }
        if second > 59 {
            return Err(RangeError::Second);
        }
        Ok(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    pub const fn year(&self) -> u16 {
        self.year
    }

    pub const fn month(&self) -> u8 {
        self.month
    }

    pub const fn day(&self) -> u8 {
        self.day
    }

    pub const fn hour(&self) -> u8 {
        self.hour
    }

    pub const fn minute(&self) -> u8 {
        self.minute
    }

    pub const fn second(&self) -> u8 {
        self.second
    }

    /// Seconds since 1970-01-01T00:00:00Z
    ///
    /// Impossible dates such as February 31 roll over into the next month,
    /// the same way the calendar algorithm treats them.
    pub fn to_unix_secs(&self) -> u64 {
        let days = days_from_civil(self.year, self.month, self.day) as u64;
        days * SECONDS_PER_DAY
            + (self.hour as u64) * 3600
            + (self.minute as u64) * 60
            + (self.second as u64)
    }

    /// ISO weekday, 1 = Monday ... 7 = Sunday
    pub fn weekday(&self) -> u8 {
        weekday_from_days(days_from_civil(self.year, self.month, self.day))
    }
}

/// ISO-8601 with a literal `Z` suffix, e.g. `2025-09-05T14:30:22Z`
impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}
