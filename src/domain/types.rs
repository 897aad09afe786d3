//! Shared domain types.
//!
//! Readings and period records are plain values so they can be streamed,
//! collected, or exported to CSV without conversion.

use chrono::{DateTime, Duration, Timelike, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DcsError;

/// Status assigned to records synthesized by gap interpolation.
pub const SYNTHESIZED_STATUS: i64 = 1;

/// Period granularity supported by the metering server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum Cadence {
    HalfHour,
    Hour,
    Day,
    Week,
    Month,
}

impl Cadence {
    /// Fixed nominal duration, or `None` for calendar months.
    pub fn fixed_duration(self) -> Option<Duration> {
        match self {
            Cadence::HalfHour => Some(Duration::minutes(30)),
            Cadence::Hour => Some(Duration::hours(1)),
            Cadence::Day => Some(Duration::days(1)),
            Cadence::Week => Some(Duration::weeks(1)),
            Cadence::Month => None,
        }
    }

    /// Longest span a single period can cover.
    ///
    /// Used to size windows: for months this is 31 days, so `k` months never
    /// exceed `k * upper_bound()`.
    pub fn upper_bound(self) -> Duration {
        self.fixed_duration().unwrap_or_else(|| Duration::days(31))
    }

    pub fn is_variable(self) -> bool {
        self.fixed_duration().is_none()
    }

    /// Name used by the server's `periodType` parameter.
    pub fn wire_name(self) -> &'static str {
        match self {
            Cadence::HalfHour => "halfHour",
            Cadence::Hour => "hour",
            Cadence::Day => "day",
            Cadence::Week => "week",
            Cadence::Month => "month",
        }
    }

    /// Whether `t` has no sub-cadence remainder (minutes, seconds, ...).
    ///
    /// Months additionally require day-of-month checks, see `window::calendar`.
    pub fn has_zero_remainder(self, t: DateTime<Utc>) -> bool {
        let clean_seconds = t.second() == 0 && t.nanosecond() == 0;
        match self {
            Cadence::HalfHour => clean_seconds && t.minute() % 30 == 0,
            Cadence::Hour => clean_seconds && t.minute() == 0,
            Cadence::Day | Cadence::Week | Cadence::Month => {
                clean_seconds && t.minute() == 0 && t.hour() == 0
            }
        }
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Data source selector understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Automatic,
    Manual,
    Merged,
}

impl Source {
    pub fn wire_name(self) -> &'static str {
        match self {
            Source::Automatic => "automatic",
            Source::Manual => "manual",
            Source::Merged => "merged",
        }
    }
}

/// Pass-through request options. The server owns their semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingFlags {
    pub calibrated: bool,
    pub interpolated: bool,
    pub use_local_time: bool,
    pub source: Source,
    /// 0..=15
    pub decimal_places: u8,
}

impl Default for ReadingFlags {
    fn default() -> Self {
        Self {
            calibrated: true,
            interpolated: true,
            use_local_time: false,
            source: Source::Automatic,
            decimal_places: 15,
        }
    }
}

/// Half-open `[start, end)` request range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// A single observation as delivered by the server.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub status: Option<i64>,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            timestamp,
            value,
            status: None,
        }
    }

    pub fn with_status(mut self, status: i64) -> Self {
        self.status = Some(status);
        self
    }
}

/// A period-start record with the delta attributed to that period.
///
/// `period_value` is `None` only for the final record of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodRecord {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub status: i64,
    pub period_value: Option<f64>,
}

impl PeriodRecord {
    pub fn is_synthesized(&self) -> bool {
        self.status == SYNTHESIZED_STATUS
    }
}

/// How to treat fixed-cadence gaps that are not a whole number of periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Synthesize `floor(gap / unit)` periods.
    #[default]
    Truncate,
    /// Fail with `DcsError::Alignment`.
    Reject,
}

/// Whether fetched readings are collected up front or pulled on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    Eager,
    #[default]
    Lazy,
}

/// How a response body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Pull readings from the body as the consumer iterates.
    Streaming,
    /// Read and decode the whole body before returning.
    Eager,
}

impl Default for DecodeMode {
    fn default() -> Self {
        if cfg!(feature = "streaming") {
            DecodeMode::Streaming
        } else {
            DecodeMode::Eager
        }
    }
}

impl From<FetchMode> for DecodeMode {
    fn from(mode: FetchMode) -> Self {
        match mode {
            FetchMode::Eager => DecodeMode::Eager,
            FetchMode::Lazy => DecodeMode::default(),
        }
    }
}

/// Scalar response fields in arrival order.
pub type Header = serde_json::Map<String, serde_json::Value>;

/// Forward-only sequence of readings; fused after the first error.
pub type ReadingStream = Box<dyn Iterator<Item = Result<Reading, DcsError>> + Send>;

/// Readings held by a `FetchResult`.
pub enum Readings {
    Collected(Vec<Reading>),
    Streamed(ReadingStream),
}

impl Readings {
    pub fn empty() -> Self {
        Readings::Collected(Vec::new())
    }

    pub fn is_streamed(&self) -> bool {
        matches!(self, Readings::Streamed(_))
    }

    /// Materialize all readings, surfacing the first stream error.
    pub fn collect_all(self) -> Result<Vec<Reading>, DcsError> {
        match self {
            Readings::Collected(v) => Ok(v),
            Readings::Streamed(stream) => stream.collect(),
        }
    }

    pub fn into_stream(self) -> ReadingStream {
        match self {
            Readings::Collected(v) => Box::new(v.into_iter().map(Ok)),
            Readings::Streamed(stream) => stream,
        }
    }
}

impl IntoIterator for Readings {
    type Item = Result<Reading, DcsError>;
    type IntoIter = ReadingStream;

    fn into_iter(self) -> Self::IntoIter {
        self.into_stream()
    }
}

impl std::fmt::Debug for Readings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Readings::Collected(v) => f.debug_tuple("Collected").field(&v.len()).finish(),
            Readings::Streamed(_) => f.write_str("Streamed(..)"),
        }
    }
}

/// Decoded response for one window (or several, once concatenated).
#[derive(Debug)]
pub struct FetchResult {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub header: Header,
    pub readings: Readings,
}

/// One logical "large readings" request.
#[derive(Debug, Clone)]
pub struct ReadingsRequest {
    /// Register or virtual meter id, e.g. `R839` or `VM88`.
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub cadence: Cadence,
    /// Largest span the server accepts per request.
    pub max_window: Duration,
    pub flags: ReadingFlags,
}
