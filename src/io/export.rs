//! CSV export of readings and period records.
//!
//! Rows are written as they are pulled, so a streamed request is never held
//! in memory just to be exported.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{PeriodRecord, Reading};
use crate::error::{AppError, DcsError};

/// Write readings to `path`; returns the number of rows written.
pub fn write_readings_csv(
    path: &Path,
    readings: impl IntoIterator<Item = Result<Reading, DcsError>>,
) -> Result<usize, AppError> {
    let file = create(path)?;
    write_rows(file, readings)
}

/// Write period records to `path`; returns the number of rows written.
pub fn write_periods_csv(
    path: &Path,
    records: impl IntoIterator<Item = Result<PeriodRecord, DcsError>>,
) -> Result<usize, AppError> {
    let file = create(path)?;
    write_rows(file, records)
}

fn create(path: &Path) -> Result<std::fs::File, AppError> {
    std::fs::File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))
}

pub fn write_rows<W: Write, T: Serialize>(
    out: W,
    rows: impl IntoIterator<Item = Result<T, DcsError>>,
) -> Result<usize, AppError> {
    let mut writer = csv::Writer::from_writer(out);
    let mut n = 0;
    for row in rows {
        let row = row?;
        writer
            .serialize(&row)
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
        n += 1;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV: {e}")))?;
    Ok(n)
}
