//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the cadence table (`Cadence`) and request options (`ReadingFlags`, `Source`)
//! - request windows and readings (`Window`, `Reading`, `FetchResult`)
//! - derived period records (`PeriodRecord`)

pub mod types;

pub use types::*;
