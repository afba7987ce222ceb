//! Temporal constraint evaluation.
//!
//! [`evaluate`] is a pure function of the constraint, the current instant and
//! the session's last access. Checks run in a fixed order and the first
//! failure wins:
//!
//! 1. day of week
//! 2. begin/end date
//! 3. begin/end time of day
//! 4. lockout window
//! 5. inactivity timeout (only when `last_access` is known)

use bastion_types::{AccessError, Constraint, TemporalFailure};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Evaluates `constraint` at `now`.
pub fn evaluate(
    constraint: &Constraint,
    now: NaiveDateTime,
    last_access: Option<NaiveDateTime>,
) -> Result<(), TemporalFailure> {
    let today = now.date();

    if !constraint.allows_weekday(today) {
        return Err(TemporalFailure::Day);
    }
    if !within_dates(constraint.begin_date, constraint.end_date, today) {
        return Err(TemporalFailure::Date);
    }
    if !within_times(constraint.begin_time, constraint.end_time, now.time()) {
        return Err(TemporalFailure::Time);
    }
    if locked_out(constraint.begin_lock_date, constraint.end_lock_date, today) {
        return Err(TemporalFailure::Lockout);
    }
    if let Some(last) = last_access {
        if timed_out(constraint.timeout, last, now) {
            return Err(TemporalFailure::Timeout);
        }
    }
    Ok(())
}

/// [`evaluate`] with the failure lifted into [`AccessError`].
pub fn check(
    constraint: Option<&Constraint>,
    now: NaiveDateTime,
    last_access: Option<NaiveDateTime>,
) -> Result<(), AccessError> {
    match constraint {
        Some(c) => evaluate(c, now, last_access).map_err(AccessError::from),
        None => Ok(()),
    }
}

/// Inclusive date window; open when either end is unset.
fn within_dates(begin: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> bool {
    match (begin, end) {
        (Some(begin), Some(end)) => begin <= today && today <= end,
        _ => true,
    }
}

/// Inclusive time window; open when either end is unset.
///
/// `end < begin` describes an overnight window such as 2200-0600, which
/// allows times after `begin` or before `end`.
fn within_times(begin: Option<NaiveTime>, end: Option<NaiveTime>, now: NaiveTime) -> bool {
    match (begin, end) {
        (Some(begin), Some(end)) if begin <= end => begin <= now && now <= end,
        (Some(begin), Some(end)) => now >= begin || now <= end,
        _ => true,
    }
}

/// Inclusive lockout window. An unset end locks out from `begin` onward; an
/// unset begin locks out until `end`.
fn locked_out(begin: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> bool {
    match (begin, end) {
        (Some(begin), Some(end)) => begin <= today && today <= end,
        (Some(begin), None) => today >= begin,
        (None, Some(end)) => today <= end,
        (None, None) => false,
    }
}

fn timed_out(timeout_minutes: u32, last_access: NaiveDateTime, now: NaiveDateTime) -> bool {
    if timeout_minutes == 0 {
        return false;
    }
    let idle = now.signed_duration_since(last_access);
    idle.num_minutes() >= i64::from(timeout_minutes)
}
