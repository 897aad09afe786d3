//! Multi-window fetching.
//!
//! `fetch_all` turns planned windows into a lazy sequence of per-window
//! results. Windows are fetched strictly in order, one at a time, and only
//! when the consumer asks for the next one; dropping the sequence early means
//! later windows are never requested.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{Cadence, DecodeMode, FetchResult, Header, ReadingFlags, Readings, Window};
use crate::error::DcsError;
use crate::io::{RawResponse, decode, parse_timestamp};

pub mod concat;

pub use concat::{concatenate, concatenate_lazy};

/// Transport for one readings request.
///
/// Implementations own authentication, timeouts, retries of 502/503/504 and
/// the per-session lock. A non-recoverable status must be returned as
/// `DcsError::Request` rather than as a response.
pub trait WindowSource {
    fn fetch_window(
        &self,
        id: &str,
        window: &Window,
        cadence: Cadence,
        flags: &ReadingFlags,
    ) -> Result<RawResponse, DcsError>;
}

impl<S: WindowSource + ?Sized> WindowSource for std::sync::Arc<S> {
    fn fetch_window(
        &self,
        id: &str,
        window: &Window,
        cadence: Cadence,
        flags: &ReadingFlags,
    ) -> Result<RawResponse, DcsError> {
        (**self).fetch_window(id, window, cadence, flags)
    }
}

/// Fetch and decode a single window.
pub fn fetch_one<S: WindowSource + ?Sized>(
    source: &S,
    id: &str,
    window: &Window,
    cadence: Cadence,
    flags: &ReadingFlags,
    mode: DecodeMode,
) -> Result<FetchResult, DcsError> {
    let raw = source.fetch_window(id, window, cadence, flags)?;
    if !(200..300).contains(&raw.status()) {
        return Err(DcsError::request(
            Some(raw.status()),
            format!("unexpected response status for {id}"),
        ));
    }
    let (header, readings) = decode(raw, mode)?;
    into_fetch_result(window, header, readings)
}

/// Attach resolved start/end times, falling back to the requested window.
pub fn into_fetch_result(
    window: &Window,
    header: Header,
    readings: Readings,
) -> Result<FetchResult, DcsError> {
    let start_time = header_time(&header, "startTime")?.unwrap_or(window.start);
    let end_time = header_time(&header, "endTime")?.unwrap_or(window.end);
    Ok(FetchResult {
        start_time,
        end_time,
        header,
        readings,
    })
}

fn header_time(header: &Header, key: &str) -> Result<Option<DateTime<Utc>>, DcsError> {
    match header.get(key) {
        Some(Value::String(s)) => parse_timestamp(s).map(Some),
        _ => Ok(None),
    }
}

/// Lazily fetch `windows` in order with `fetch_window`.
///
/// After the first error the sequence ends; results already yielded stay valid.
pub fn fetch_all<F>(windows: Vec<Window>, fetch_window: F) -> WindowFetches<F>
where
    F: FnMut(&Window) -> Result<FetchResult, DcsError>,
{
    WindowFetches {
        windows: windows.into_iter(),
        fetch_window,
        index: 0,
        failed: false,
    }
}

pub struct WindowFetches<F> {
    windows: std::vec::IntoIter<Window>,
    fetch_window: F,
    index: usize,
    failed: bool,
}

impl<F> WindowFetches<F> {
    pub fn remaining(&self) -> usize {
        if self.failed { 0 } else { self.windows.len() }
    }
}

impl<F> Iterator for WindowFetches<F>
where
    F: FnMut(&Window) -> Result<FetchResult, DcsError>,
{
    type Item = Result<FetchResult, DcsError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let window = self.windows.next()?;
        self.index += 1;
        log::info!(
            "Fetching window {} ({} -> {})",
            self.index,
            window.start,
            window.end
        );

        let result = (self.fetch_window)(&window);
        if let Err(err) = &result {
            log::warn!("Window {} failed: {err}", self.index);
            self.failed = true;
        }
        Some(result)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeServer;
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn fetch_one_resolves_header_times() {
        let server = FakeServer::new(utc(2022, 1, 1), Duration::days(1));
        let window = Window::new(utc(2022, 1, 3), utc(2022, 1, 6));
        let result = fetch_one(
            &server,
            "R1",
            &window,
            Cadence::Day,
            &ReadingFlags::default(),
            DecodeMode::Streaming,
        )
        .unwrap();

        assert_eq!(result.start_time, window.start);
        assert_eq!(result.end_time, window.end);
        assert_eq!(result.header.get("id"), Some(&Value::from("R1")));
        let readings = result.readings.collect_all().unwrap();
        assert_eq!(readings.len(), 3);
        assert_eq!(readings[0].value, 1.0);
    }

    #[test]
    fn missing_header_times_fall_back_to_window() {
        let window = Window::new(utc(2022, 1, 1), utc(2022, 2, 1));
        let result = into_fetch_result(&window, Header::new(), Readings::empty()).unwrap();
        assert_eq!(result.start_time, window.start);
        assert_eq!(result.end_time, window.end);
    }

    #[test]
    fn windows_are_fetched_only_when_pulled() {
        let server = FakeServer::new(utc(2022, 1, 1), Duration::days(1));
        let windows = vec![
            Window::new(utc(2022, 1, 1), utc(2022, 1, 3)),
            Window::new(utc(2022, 1, 3), utc(2022, 1, 5)),
            Window::new(utc(2022, 1, 5), utc(2022, 1, 7)),
        ];
        let mut fetches = fetch_all(windows, |w| {
            fetch_one(&server, "R1", w, Cadence::Day, &ReadingFlags::default(), DecodeMode::Eager)
        });

        assert_eq!(server.request_count(), 0);
        let first = fetches.next().unwrap().unwrap();
        assert_eq!(first.start_time, utc(2022, 1, 1));
        assert_eq!(server.request_count(), 1);
        assert_eq!(fetches.remaining(), 2);
        drop(fetches);
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn first_error_ends_the_sequence() {
        let mut server = FakeServer::new(utc(2022, 1, 1), Duration::days(1));
        server.fail_on = Some(2);
        let windows: Vec<Window> = (0..4)
            .map(|k| Window::new(utc(2022, 1, 1 + 2 * k), utc(2022, 1, 3 + 2 * k)))
            .collect();

        let results: Vec<_> = fetch_all(windows, |w| {
            fetch_one(&server, "R1", w, Cadence::Day, &ReadingFlags::default(), DecodeMode::Eager)
        })
        .collect();

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert_eq!(results[1].as_ref().err().and_then(DcsError::status), Some(404));
        assert_eq!(server.request_count(), 2);
    }
}
