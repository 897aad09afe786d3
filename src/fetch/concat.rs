//! Stitching per-window results into one logical result.
//!
//! Windows from the planner are contiguous and non-overlapping, so readings
//! are appended in window order with no reordering or deduplication.

use chrono::{DateTime, Utc};

use crate::domain::{FetchResult, Reading, ReadingStream, Readings};
use crate::error::DcsError;

/// Collect every window and append their readings.
///
/// Header fields come from the first window, `end_time` from the last.
pub fn concatenate(
    results: impl IntoIterator<Item = Result<FetchResult, DcsError>>,
) -> Result<FetchResult, DcsError> {
    let mut results = results.into_iter();
    let first = results
        .next()
        .ok_or_else(|| DcsError::InvalidRange("no windows to concatenate".to_string()))??;

    let mut readings = first.readings.collect_all()?;
    let mut end_time = first.end_time;
    for result in results {
        let result = result?;
        end_time = result.end_time;
        readings.extend(result.readings.collect_all()?);
    }

    Ok(FetchResult {
        start_time: first.start_time,
        end_time,
        header: first.header,
        readings: Readings::Collected(readings),
    })
}

/// Chain window streams without holding more than one window at a time.
///
/// The first window is fetched immediately to obtain the header. Later
/// windows are fetched as the readings are pulled. The last window's resolved
/// end is not known until it has been fetched, so `planned_end` stands in.
pub fn concatenate_lazy<I>(mut results: I, planned_end: DateTime<Utc>) -> Result<FetchResult, DcsError>
where
    I: Iterator<Item = Result<FetchResult, DcsError>> + Send + 'static,
{
    let first = results
        .next()
        .ok_or_else(|| DcsError::InvalidRange("no windows to concatenate".to_string()))??;

    let chained = ChainedReadings {
        current: Some(first.readings.into_stream()),
        rest: Box::new(results),
        done: false,
    };

    Ok(FetchResult {
        start_time: first.start_time,
        end_time: planned_end,
        header: first.header,
        readings: Readings::Streamed(Box::new(chained)),
    })
}

struct ChainedReadings {
    current: Option<ReadingStream>,
    rest: Box<dyn Iterator<Item = Result<FetchResult, DcsError>> + Send>,
    done: bool,
}

impl Iterator for ChainedReadings {
    type Item = Result<Reading, DcsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }
            if let Some(stream) = self.current.as_mut() {
                match stream.next() {
                    Some(Ok(reading)) => return Some(Ok(reading)),
                    Some(Err(err)) => {
                        self.done = true;
                        self.current = None;
                        return Some(Err(err));
                    }
                    // Release this window's response before requesting the next.
                    None => self.current = None,
                }
            }
            match self.rest.next() {
                Some(Ok(result)) => self.current = Some(result.readings.into_stream()),
                Some(Err(err)) => {
                    self.done = true;
                    return Some(Err(err));
                }
                None => {
                    self.done = true;
                    return None;
                }
            }
        }
    }
}
