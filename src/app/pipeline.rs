//! Shared "large readings" workflow used by the client and the CLI.
//!
//! plan windows -> fetch each window -> decode -> concatenate
//!
//! Planning errors surface before any request is made.

use crate::domain::{DecodeMode, FetchMode, FetchResult, GapPolicy, PeriodRecord, ReadingsRequest};
use crate::error::DcsError;
use crate::fetch::{WindowSource, concatenate, concatenate_lazy, fetch_all, fetch_one};
use crate::period::derive_periods_with;

/// Fetch `request` from `source`, splitting it into server-sized windows.
///
/// In `FetchMode::Lazy` the first window is fetched now and the rest as the
/// returned readings are pulled.
pub fn large_readings<S>(source: S, request: &ReadingsRequest, mode: FetchMode) -> Result<FetchResult, DcsError>
where
    S: WindowSource + Send + 'static,
{
    let windows = crate::window::plan(request.start, request.end, request.cadence, request.max_window)?;
    log::info!(
        "Planned {} window(s) for {} ({} -> {}, {})",
        windows.len(),
        request.id,
        request.start,
        request.end,
        request.cadence
    );

    // The aligned end can differ from the requested one (month ends move to the next 1st).
    let planned_end = windows.last().map_or(request.end, |w| w.end);

    let id = request.id.clone();
    let cadence = request.cadence;
    let flags = request.flags.clone();
    let decode_mode = DecodeMode::from(mode);
    let fetches = fetch_all(windows, move |window| {
        fetch_one(&source, &id, window, cadence, &flags, decode_mode)
    });

    match mode {
        FetchMode::Eager => concatenate(fetches),
        FetchMode::Lazy => concatenate_lazy(fetches, planned_end),
    }
}

/// Period records over a fetched result, pulled as the readings are.
pub fn periods(
    result: FetchResult,
    request: &ReadingsRequest,
    policy: GapPolicy,
) -> impl Iterator<Item = Result<PeriodRecord, DcsError>> + Send {
    derive_periods_with(result.readings, request.cadence, policy)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::domain::{Cadence, Reading, ReadingFlags, Window};
    use crate::fetch::testing::FakeServer;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn request(start: DateTime<Utc>, end: DateTime<Utc>, cadence: Cadence, max_days: i64) -> ReadingsRequest {
        ReadingsRequest {
            id: "R839".to_string(),
            start,
            end,
            cadence,
            max_window: Duration::days(max_days),
            flags: ReadingFlags::default(),
        }
    }

    fn single_window(server: &FakeServer, request: &ReadingsRequest) -> Vec<Reading> {
        let window = Window::new(request.start, request.end);
        fetch_one(server, &request.id, &window, request.cadence, &request.flags, DecodeMode::Eager)
            .unwrap()
            .readings
            .collect_all()
            .unwrap()
    }

    #[test]
    fn eager_concat_equals_an_unbounded_fetch() {
        let server = Arc::new(FakeServer::new(utc(2022, 1, 1), Duration::hours(1)));
        let req = request(utc(2022, 1, 1), utc(2022, 3, 15), Cadence::Hour, 10);

        let result = large_readings(Arc::clone(&server), &req, FetchMode::Eager).unwrap();
        assert!(!result.readings.is_streamed());
        assert_eq!(result.start_time, req.start);
        assert_eq!(result.end_time, req.end);
        assert_eq!(result.header.get("name").and_then(|v| v.as_str()), Some("Fake meter"));

        let windows = server.request_count();
        assert!(windows > 1);
        let combined = result.readings.collect_all().unwrap();
        assert_eq!(combined, single_window(&server, &req));
        assert_eq!(combined.len(), (73 * 24) as usize);
    }

    #[test]
    fn lazy_fetches_windows_as_readings_are_pulled() {
        let mut fake = FakeServer::new(utc(2022, 1, 1), Duration::days(1));
        fake.gzip = true;
        let server = Arc::new(fake);
        let req = request(utc(2022, 1, 1), utc(2022, 1, 21), Cadence::Day, 5);

        let result = large_readings(Arc::clone(&server), &req, FetchMode::Lazy).unwrap();
        assert!(result.readings.is_streamed());
        assert_eq!(result.end_time, req.end);
        assert_eq!(server.request_count(), 1);

        let mut readings = result.readings.into_iter();
        let first_six: Vec<_> = readings.by_ref().take(6).map(Result::unwrap).collect();
        assert_eq!(first_six[5].timestamp, utc(2022, 1, 6));
        assert_eq!(server.request_count(), 2);

        drop(readings);
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn failure_on_window_three_keeps_earlier_readings() {
        let mut fake = FakeServer::new(utc(2022, 1, 1), Duration::days(1));
        fake.fail_on = Some(3);
        let server = Arc::new(fake);
        let req = request(utc(2022, 1, 1), utc(2022, 1, 11), Cadence::Day, 2);

        let result = large_readings(Arc::clone(&server), &req, FetchMode::Lazy).unwrap();
        let items: Vec<_> = result.readings.into_iter().collect();

        assert_eq!(items.len(), 5);
        for (k, item) in items[..4].iter().enumerate() {
            let reading = item.as_ref().unwrap();
            assert_eq!(reading.timestamp, utc(2022, 1, 1 + k as u32));
            assert_eq!(reading.value, server.value_at(reading.timestamp));
        }
        assert_eq!(items[4].as_ref().err().and_then(DcsError::status), Some(404));
        assert_eq!(server.request_count(), 3);

        let mut fresh = FakeServer::new(utc(2022, 1, 1), Duration::days(1));
        fresh.fail_on = Some(3);
        let eager = large_readings(Arc::new(fresh), &req, FetchMode::Eager);
        assert!(matches!(eager, Err(DcsError::Request { status: Some(404), .. })));
    }

    #[test]
    fn lazy_and_eager_agree_on_an_aligned_month_end() {
        let server = Arc::new(FakeServer::new(utc(2020, 1, 1), Duration::days(1)));
        let req = request(utc(2020, 1, 1), utc(2020, 12, 31), Cadence::Month, 100);

        let eager = large_readings(Arc::clone(&server), &req, FetchMode::Eager).unwrap();
        let lazy = large_readings(Arc::clone(&server), &req, FetchMode::Lazy).unwrap();
        assert_eq!(eager.end_time, utc(2021, 1, 1));
        assert_eq!(lazy.end_time, eager.end_time);
        assert_eq!(lazy.start_time, eager.start_time);
    }

    #[test]
    fn planning_errors_happen_before_any_request() {
        let server = Arc::new(FakeServer::new(utc(2022, 1, 1), Duration::days(1)));
        let mut req = request(utc(2022, 1, 1), utc(2022, 1, 11), Cadence::Day, 2);
        req.start += Duration::hours(3);

        let err = large_readings(Arc::clone(&server), &req, FetchMode::Lazy).unwrap_err();
        assert!(matches!(err, DcsError::Alignment(_)));
        assert_eq!(server.request_count(), 0);
    }

    #[test]
    fn periods_over_monthly_windows() {
        let server = Arc::new(FakeServer::new(utc(2022, 1, 1), Duration::days(1)));
        let req = request(utc(2022, 1, 1), utc(2022, 4, 1), Cadence::Day, 31);

        let result = large_readings(Arc::clone(&server), &req, FetchMode::Lazy).unwrap();
        let records: Vec<PeriodRecord> = periods(result, &req, GapPolicy::Reject)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(records.len(), 90);
        assert!(records[..89].iter().all(|r| r.period_value == Some(0.5)));
        assert!(records.iter().all(|r| !r.is_synthesized()));
        assert_eq!(records[89].period_value, None);
        assert_eq!(records[89].timestamp, utc(2022, 3, 31));
    }
}
