//! Period values from cumulative readings.
//!
//! Consecutive anchors one cadence apart give a plain first difference.
//! Anchors further apart are bridged with synthesized records (status 1) so the
//! output keeps a regular cadence. The last anchor is emitted with no period
//! value, since there is nothing after it to difference against.
//!
//! Output timestamps mark the start of each period.

use chrono::Duration;

use crate::domain::{Cadence, GapPolicy, PeriodRecord, Reading};
use crate::error::DcsError;

mod interpolate;

use interpolate::Gap;

/// Lazy period records over `anchors` with `GapPolicy::Truncate`.
pub fn derive_periods<I>(anchors: I, cadence: Cadence) -> PeriodIter<I::IntoIter>
where
    I: IntoIterator<Item = Result<Reading, DcsError>>,
{
    derive_periods_with(anchors, cadence, GapPolicy::default())
}

pub fn derive_periods_with<I>(anchors: I, cadence: Cadence, policy: GapPolicy) -> PeriodIter<I::IntoIter>
where
    I: IntoIterator<Item = Result<Reading, DcsError>>,
{
    PeriodIter {
        anchors: anchors.into_iter(),
        cadence,
        policy,
        before: None,
        gap: None,
        done: false,
    }
}

/// Convenience for already-materialized readings.
pub fn periods_from_readings(
    readings: impl IntoIterator<Item = Reading>,
    cadence: Cadence,
    policy: GapPolicy,
) -> Result<Vec<PeriodRecord>, DcsError> {
    derive_periods_with(readings.into_iter().map(Ok), cadence, policy).collect()
}

/// Whether two anchors are exactly one period apart.
fn is_one_period(cadence: Cadence, span: Duration) -> bool {
    match cadence.fixed_duration() {
        Some(unit) => span == unit,
        None => Duration::days(28) <= span && span <= Duration::days(31),
    }
}

pub struct PeriodIter<I> {
    anchors: I,
    cadence: Cadence,
    policy: GapPolicy,
    before: Option<Reading>,
    gap: Option<Gap>,
    done: bool,
}

impl<I> PeriodIter<I>
where
    I: Iterator<Item = Result<Reading, DcsError>>,
{
    fn fail(&mut self, err: DcsError) -> Option<Result<PeriodRecord, DcsError>> {
        self.done = true;
        self.gap = None;
        Some(Err(err))
    }
}

impl<I> Iterator for PeriodIter<I>
where
    I: Iterator<Item = Result<Reading, DcsError>>,
{
    type Item = Result<PeriodRecord, DcsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(gap) = self.gap.as_mut() {
                match gap.next() {
                    Some(Ok(record)) => return Some(Ok(record)),
                    Some(Err(err)) => return self.fail(err),
                    None => self.gap = None,
                }
            }

            let before = match self.before {
                Some(before) => before,
                None => match self.anchors.next() {
                    None => {
                        self.done = true;
                        return None;
                    }
                    Some(Err(err)) => return self.fail(err),
                    Some(Ok(first)) => {
                        self.before = Some(first);
                        continue;
                    }
                },
            };

            let after = match self.anchors.next() {
                None => {
                    self.done = true;
                    return Some(Ok(PeriodRecord {
                        timestamp: before.timestamp,
                        value: before.value,
                        status: before.status.unwrap_or(0),
                        period_value: None,
                    }));
                }
                Some(Err(err)) => return self.fail(err),
                Some(Ok(after)) => after,
            };

            if after.timestamp <= before.timestamp {
                return self.fail(DcsError::InvalidRange(format!(
                    "readings must be strictly increasing: {} followed by {}",
                    before.timestamp, after.timestamp
                )));
            }
            self.before = Some(after);

            if is_one_period(self.cadence, after.timestamp - before.timestamp) {
                return Some(Ok(PeriodRecord {
                    timestamp: before.timestamp,
                    value: before.value,
                    status: before.status.unwrap_or(0),
                    period_value: Some(after.value - before.value),
                }));
            }

            match Gap::new(&before, &after, self.cadence, self.policy) {
                Ok(gap) => self.gap = Some(gap),
                Err(err) => return self.fail(err),
            }
        }
    }
}
