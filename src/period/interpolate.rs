//! Gap interpolation between two anchors.
//!
//! Both variants start at the earlier anchor (inclusive) and stop before the
//! later one. Fixed cadences share one constant period value across the gap;
//! months apportion the delta by each month's length.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Cadence, GapPolicy, PeriodRecord, Reading, SYNTHESIZED_STATUS};
use crate::error::DcsError;
use crate::window::calendar;

/// Synthesized records spanning `[before, after)`.
pub(crate) enum Gap {
    Fixed(FixedGap),
    Month(MonthGap),
}

impl Gap {
    pub fn new(
        before: &Reading,
        after: &Reading,
        cadence: Cadence,
        policy: GapPolicy,
    ) -> Result<Self, DcsError> {
        match cadence.fixed_duration() {
            Some(unit) => FixedGap::new(before, after, unit, policy).map(Gap::Fixed),
            None => Ok(Gap::Month(MonthGap::new(before, after))),
        }
    }
}

impl Iterator for Gap {
    type Item = Result<PeriodRecord, DcsError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Gap::Fixed(gap) => gap.next().map(Ok),
            Gap::Month(gap) => gap.next(),
        }
    }
}

fn micros(d: Duration) -> i64 {
    d.num_microseconds().unwrap_or(i64::MAX)
}

pub(crate) struct FixedGap {
    start: DateTime<Utc>,
    start_value: f64,
    unit_us: i64,
    t_delta_us: i64,
    v_delta: f64,
    count: i64,
    k: i64,
}

impl FixedGap {
    fn new(
        before: &Reading,
        after: &Reading,
        unit: Duration,
        policy: GapPolicy,
    ) -> Result<Self, DcsError> {
        let unit_us = micros(unit);
        let t_delta_us = micros(after.timestamp - before.timestamp);
        let count = t_delta_us / unit_us;

        if t_delta_us % unit_us != 0 {
            match policy {
                GapPolicy::Reject => {
                    return Err(DcsError::Alignment(format!(
                        "gap {} -> {} is not a whole number of periods",
                        before.timestamp, after.timestamp
                    )));
                }
                GapPolicy::Truncate => log::warn!(
                    "Gap {} -> {} is not a whole number of periods; synthesizing {count}",
                    before.timestamp,
                    after.timestamp
                ),
            }
        }

        Ok(Self {
            start: before.timestamp,
            start_value: before.value,
            unit_us,
            t_delta_us,
            v_delta: after.value - before.value,
            count,
            k: 0,
        })
    }
}

impl Iterator for FixedGap {
    type Item = PeriodRecord;

    fn next(&mut self) -> Option<Self::Item> {
        if self.k >= self.count {
            return None;
        }
        let since_start = self.k * self.unit_us;
        self.k += 1;

        let t_delta = self.t_delta_us as f64;
        Some(PeriodRecord {
            timestamp: self.start + Duration::microseconds(since_start),
            value: self.start_value + self.v_delta * since_start as f64 / t_delta,
            status: SYNTHESIZED_STATUS,
            period_value: Some(self.unit_us as f64 * self.v_delta / t_delta),
        })
    }
}

pub(crate) struct MonthGap {
    target: DateTime<Utc>,
    end: DateTime<Utc>,
    value: f64,
    last_period_value: f64,
    t_delta_us: i64,
    v_delta: f64,
    failed: bool,
}

impl MonthGap {
    fn new(before: &Reading, after: &Reading) -> Self {
        Self {
            target: before.timestamp,
            end: after.timestamp,
            value: before.value,
            last_period_value: 0.0,
            t_delta_us: micros(after.timestamp - before.timestamp),
            v_delta: after.value - before.value,
            failed: false,
        }
    }
}

impl Iterator for MonthGap {
    type Item = Result<PeriodRecord, DcsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.target >= self.end {
            return None;
        }
        let next = match calendar::add_months(self.target, 1) {
            Ok(next) => next.min(self.end),
            Err(err) => {
                self.failed = true;
                return Some(Err(err));
            }
        };

        // Chained from the previous sub-period, not recomputed from the anchors.
        self.value += self.last_period_value;
        let period_value =
            self.v_delta * micros(next - self.target) as f64 / self.t_delta_us as f64;

        let record = PeriodRecord {
            timestamp: self.target,
            value: self.value,
            status: SYNTHESIZED_STATUS,
            period_value: Some(period_value),
        };
        self.last_period_value = period_value;
        self.target = next;
        Some(Ok(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, value: f64) -> Reading {
        Reading::new(Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap(), value).with_status(0)
    }

    #[test]
    fn fixed_gap_is_linear() {
        let before = at(2022, 1, 1, 0.0);
        let after = at(2022, 1, 5, 8.0);
        let records: Vec<_> = FixedGap::new(&before, &after, Duration::days(1), GapPolicy::Reject)
            .unwrap()
            .collect();
        let values: Vec<f64> = records.iter().map(|r| r.value).collect();
        assert_eq!(values, vec![0.0, 2.0, 4.0, 6.0]);
        assert!(records.iter().all(|r| r.period_value == Some(2.0)));
        assert!(records.iter().all(|r| r.status == SYNTHESIZED_STATUS));
        assert_eq!(records[3].timestamp, Utc.with_ymd_and_hms(2022, 1, 4, 0, 0, 0).unwrap());
    }

    #[test]
    fn fractional_fixed_gap_truncates_or_rejects() {
        let before = at(2022, 1, 1, 0.0);
        let mut after = at(2022, 1, 3, 5.0);
        after.timestamp += Duration::hours(12);

        let n = FixedGap::new(&before, &after, Duration::days(1), GapPolicy::Truncate)
            .unwrap()
            .count();
        assert_eq!(n, 2);

        let err = FixedGap::new(&before, &after, Duration::days(1), GapPolicy::Reject)
            .err()
            .unwrap();
        assert!(matches!(err, DcsError::Alignment(_)));
    }

    #[test]
    fn month_gap_apportions_by_days() {
        let before = at(2020, 2, 1, 4.0);
        let after = at(2020, 5, 1, 7.0);
        let records: Vec<_> = MonthGap::new(&before, &after).map(Result::unwrap).collect();

        assert_eq!(records.len(), 3);
        let pv: Vec<f64> = records.iter().map(|r| r.period_value.unwrap()).collect();
        assert!((pv[0] - 3.0 * 29.0 / 90.0).abs() < 1e-12);
        assert!((pv[1] - 3.0 * 31.0 / 90.0).abs() < 1e-12);
        assert!((pv[2] - 3.0 * 30.0 / 90.0).abs() < 1e-12);
        assert!((records[1].value - (4.0 + pv[0])).abs() < 1e-12);
        assert!((records[2].value - (4.0 + pv[0] + pv[1])).abs() < 1e-12);
    }

    #[test]
    fn month_gap_off_month_start_is_clamped_at_the_anchor() {
        let before = at(2021, 1, 15, 0.0);
        let after = at(2021, 3, 1, 45.0);
        let records: Vec<_> = MonthGap::new(&before, &after).map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        let total: f64 = records.iter().map(|r| r.period_value.unwrap()).sum();
        assert!((total - 45.0).abs() < 1e-9);
    }
}
