//! Window planning.
//!
//! The server caps the span of a single readings request. A larger range is
//! split into the smallest number of contiguous windows whose period counts
//! differ by at most one, with the longer windows first.

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Cadence, Window};
use crate::error::DcsError;
use crate::window::calendar;

/// Split `[start, end)` into server-legal windows.
///
/// `max_window` below one cadence unit is raised to one unit.
pub fn plan(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    cadence: Cadence,
    max_window: Duration,
) -> Result<Vec<Window>, DcsError> {
    let range = calendar::align_range(start, end, cadence)?;
    let unit = cadence.upper_bound();
    let max_window = max_window.max(unit);

    if range.span() <= max_window {
        return Ok(vec![range]);
    }

    let req_periods = calendar::period_count(&range, cadence);
    if req_periods <= 0 {
        return Err(DcsError::InvalidRange(format!(
            "range {}..{} covers no whole {cadence} periods",
            range.start, range.end
        )));
    }
    let max_periods = max_window.num_seconds() / unit.num_seconds();

    let groups = group_sizes(req_periods, max_periods);
    log::debug!(
        "Planning {req_periods} {cadence} periods into {} windows (max {max_periods} per window)",
        groups.len()
    );

    let mut windows = Vec::with_capacity(groups.len());
    let mut cursor = range.start;
    for size in groups {
        let next = calendar::advance(cursor, cadence, size)?;
        windows.push(Window::new(cursor, next));
        cursor = next;
    }
    debug_assert_eq!(cursor, range.end);

    Ok(windows)
}

/// Period counts per window: the smallest `d >= 2` groups whose largest size
/// fits in `max_periods`, remainder spread over the first groups.
pub fn group_sizes(req_periods: i64, max_periods: i64) -> Vec<i64> {
    let max_periods = max_periods.max(1);
    let mut d = 2;
    loop {
        let (i, r) = (req_periods / d, req_periods % d);
        let largest = if r > 0 { i + 1 } else { i };
        if largest <= max_periods {
            return (0..d).map(|k| if k < r { i + 1 } else { i }).collect();
        }
        d += 1;
    }
}
