//! Temporal constraints attached to users, roles and assignments.
//!
//! Directory stores hold constraint fields as strings (`HHMM`, `YYYYMMDD`,
//! a day mask such as `"23456"`, or the literal `"none"`). The parsers here
//! turn those strings into typed values once, so evaluation never re-parses.

use std::fmt::{self, Display};

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};

/// Literal used by directory stores for an unset field.
pub const NONE: &str = "none";

// ============================================================================
// Day Mask
// ============================================================================

/// Set of weekdays on which a constraint allows access.
///
/// Days are numbered `1..=7` starting with Sunday, matching the directory
/// string form. Bit `n - 1` is set when day `n` is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayMask(u8);

impl DayMask {
    pub const ALL: DayMask = DayMask(0b0111_1111);

    /// Parses `"all"` or a string of day digits such as `"23456"`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            return Ok(Self::ALL);
        }

        let mut bits = 0u8;
        for ch in value.chars() {
            let day = ch
                .to_digit(10)
                .filter(|d| (1..=7).contains(d))
                .ok_or_else(|| AccessError::ValidationFailed(format!("invalid day mask '{value}'")))?;
            bits |= 1 << (day - 1);
        }
        Ok(Self(bits))
    }

    /// Builds a mask from day numbers (1 = Sunday).
    pub fn from_days(days: &[u8]) -> Result<Self> {
        let mut bits = 0u8;
        for &day in days {
            if !(1..=7).contains(&day) {
                return Err(AccessError::ValidationFailed(format!("invalid day {day}")));
            }
            bits |= 1 << (day - 1);
        }
        Ok(Self(bits))
    }

    pub fn is_all(self) -> bool {
        self.0 == Self::ALL.0
    }

    pub fn allows(self, weekday: Weekday) -> bool {
        let day = weekday.num_days_from_sunday();
        self.0 & (1 << day) != 0
    }
}

impl Default for DayMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl Display for DayMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return write!(f, "all");
        }
        for day in 1..=7u8 {
            if self.0 & (1 << (day - 1)) != 0 {
                write!(f, "{day}")?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Field Parsers
// ============================================================================

fn is_unset(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.eq_ignore_ascii_case(NONE)
}

/// Parses an `HHMM` time of day; `"none"` or empty yields `None`.
pub fn parse_time(value: &str) -> Result<Option<NaiveTime>> {
    if is_unset(value) {
        return Ok(None);
    }
    NaiveTime::parse_from_str(value.trim(), "%H%M")
        .map(Some)
        .map_err(|_| AccessError::ValidationFailed(format!("invalid time '{value}'")))
}

/// Parses a `YYYYMMDD` date; `"none"` or empty yields `None`.
pub fn parse_date(value: &str) -> Result<Option<NaiveDate>> {
    if is_unset(value) {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value.trim(), "%Y%m%d")
        .map(Some)
        .map_err(|_| AccessError::ValidationFailed(format!("invalid date '{value}'")))
}

// ============================================================================
// Constraint
// ============================================================================

/// Temporal constraint record.
///
/// Unset fields never restrict access. A `timeout` of zero means the session
/// may stay idle indefinitely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub begin_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub begin_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub begin_lock_date: Option<NaiveDate>,
    pub end_lock_date: Option<NaiveDate>,
    pub day_mask: DayMask,
    /// Minutes of allowed inactivity, `0` for unlimited.
    pub timeout: u32,
}

impl Constraint {
    /// A constraint that never restricts.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn with_times(mut self, begin: &str, end: &str) -> Result<Self> {
        self.begin_time = parse_time(begin)?;
        self.end_time = parse_time(end)?;
        Ok(self)
    }

    pub fn with_dates(mut self, begin: &str, end: &str) -> Result<Self> {
        let begin_date = parse_date(begin)?;
        let end_date = parse_date(end)?;
        if let (Some(b), Some(e)) = (begin_date, end_date) {
            if e < b {
                return Err(AccessError::ValidationFailed(format!(
                    "end date {end} precedes begin date {begin}"
                )));
            }
        }
        self.begin_date = begin_date;
        self.end_date = end_date;
        Ok(self)
    }

    pub fn with_lock_dates(mut self, begin: &str, end: &str) -> Result<Self> {
        let begin_lock = parse_date(begin)?;
        let end_lock = parse_date(end)?;
        if let (Some(b), Some(e)) = (begin_lock, end_lock) {
            if e < b {
                return Err(AccessError::ValidationFailed(format!(
                    "end lock date {end} precedes begin lock date {begin}"
                )));
            }
        }
        self.begin_lock_date = begin_lock;
        self.end_lock_date = end_lock;
        Ok(self)
    }

    pub fn with_day_mask(mut self, mask: &str) -> Result<Self> {
        self.day_mask = DayMask::parse(mask)?;
        Ok(self)
    }

    pub fn with_timeout(mut self, minutes: u32) -> Self {
        self.timeout = minutes;
        self
    }

    /// True if no field restricts access.
    pub fn is_unrestricted(&self) -> bool {
        self.begin_time.is_none()
            && self.end_time.is_none()
            && self.begin_date.is_none()
            && self.end_date.is_none()
            && self.begin_lock_date.is_none()
            && self.end_lock_date.is_none()
            && self.day_mask.is_all()
            && self.timeout == 0
    }

    /// Returns true if `date` falls on an allowed weekday.
    pub fn allows_weekday(&self, date: NaiveDate) -> bool {
        self.day_mask.allows(date.weekday())
    }
}
