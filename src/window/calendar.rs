//! Calendar helpers and range alignment.
//!
//! Fixed cadences are plain duration arithmetic. Months are walked with
//! `chrono::Months`, which keeps day-of-month and clamps at month ends.

use chrono::{DateTime, Datelike, Duration, Months, Utc};

use crate::domain::{Cadence, Window};
use crate::error::DcsError;

/// `t + n` calendar months.
pub fn add_months(t: DateTime<Utc>, n: u32) -> Result<DateTime<Utc>, DcsError> {
    t.checked_add_months(Months::new(n))
        .ok_or_else(|| DcsError::InvalidRange(format!("{t} + {n} months is out of range")))
}

/// Whole calendar months from `start` to `end` (both month starts).
pub fn months_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end.year() as i64 - start.year() as i64) * 12 + end.month() as i64 - start.month() as i64
}

pub fn is_month_start(t: DateTime<Utc>) -> bool {
    t.day() == 1 && Cadence::Month.has_zero_remainder(t)
}

pub fn is_last_day_of_month(t: DateTime<Utc>) -> bool {
    Cadence::Month.has_zero_remainder(t) && (t + Duration::days(1)).day() == 1
}

/// Validate `[start, end)` against `cadence` and return it as a window.
///
/// For month cadence the start must be the 1st of a month. The end may be the
/// 1st of a month (exclusive) or the last day of a month, which is taken as
/// inclusive and moved to the following 1st.
pub fn align_range(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cadence: Cadence,
) -> Result<Window, DcsError> {
    if start >= end {
        return Err(DcsError::InvalidRange(format!(
            "start {start} must be before end {end}"
        )));
    }

    match cadence.fixed_duration() {
        Some(unit) => {
            for (label, t) in [("start", start), ("end", end)] {
                if !cadence.has_zero_remainder(t) {
                    return Err(DcsError::Alignment(format!(
                        "{label} {t} is not on a {cadence} boundary"
                    )));
                }
            }
            let span = (end - start).num_seconds();
            if span % unit.num_seconds() != 0 {
                return Err(DcsError::Alignment(format!(
                    "range {start}..{end} is not a whole number of {cadence} periods"
                )));
            }
            Ok(Window::new(start, end))
        }
        None => {
            if !is_month_start(start) {
                return Err(DcsError::Alignment(format!(
                    "start {start} is not the first day of a month"
                )));
            }
            let end = if is_month_start(end) {
                end
            } else if is_last_day_of_month(end) {
                end + Duration::days(1)
            } else {
                return Err(DcsError::Alignment(format!(
                    "end {end} is neither the first nor the last day of a month"
                )));
            };
            Ok(Window::new(start, end))
        }
    }
}

/// Number of whole cadence periods covered by an aligned window.
pub fn period_count(window: &Window, cadence: Cadence) -> i64 {
    match cadence.fixed_duration() {
        Some(unit) => window.span().num_seconds() / unit.num_seconds(),
        None => months_between(window.start, window.end),
    }
}

/// Move an aligned boundary forward by `periods` cadence units.
pub fn advance(t: DateTime<Utc>, cadence: Cadence, periods: i64) -> Result<DateTime<Utc>, DcsError> {
    match cadence.fixed_duration() {
        Some(unit) => Ok(t + Duration::seconds(unit.num_seconds() * periods)),
        None => {
            let n = u32::try_from(periods)
                .map_err(|_| DcsError::InvalidRange(format!("cannot advance by {periods} months")))?;
            add_months(t, n)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn month_end_on_last_day_is_inclusive() {
        let w = align_range(utc(2020, 1, 1), utc(2020, 3, 31), Cadence::Month).unwrap();
        assert_eq!(w.end, utc(2020, 4, 1));
        assert_eq!(period_count(&w, Cadence::Month), 3);
    }

    #[test]
    fn month_start_must_be_first_of_month() {
        let err = align_range(utc(2020, 1, 2), utc(2020, 3, 1), Cadence::Month).unwrap_err();
        assert!(matches!(err, DcsError::Alignment(_)));
    }

    #[test]
    fn reversed_range_is_invalid() {
        let err = align_range(utc(2020, 3, 1), utc(2020, 1, 1), Cadence::Day).unwrap_err();
        assert!(matches!(err, DcsError::InvalidRange(_)));
        let err = align_range(utc(2020, 3, 1), utc(2020, 3, 1), Cadence::Day).unwrap_err();
        assert!(matches!(err, DcsError::InvalidRange(_)));
    }

    #[test]
    fn partial_week_is_misaligned() {
        let err = align_range(utc(2020, 1, 1), utc(2020, 1, 10), Cadence::Week).unwrap_err();
        assert!(matches!(err, DcsError::Alignment(_)));
    }

    #[test]
    fn unaligned_hour_is_rejected() {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 30, 0).unwrap();
        let err = align_range(start, utc(2020, 1, 2), Cadence::Hour).unwrap_err();
        assert!(matches!(err, DcsError::Alignment(_)));
    }
}
