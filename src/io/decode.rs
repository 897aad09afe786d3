//! Readings payload decoding.
//!
//! A response body is an object of scalar header fields followed by a
//! `readings` array. `decode` returns the header plus the readings, either as
//! a pull-based stream over the body or as a collected `Vec`.

use std::io::Read;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::domain::{DecodeMode, Header, Reading, Readings};
use crate::error::DcsError;
use crate::io::raw::RawResponse;
use crate::io::scanner;

/// Decode a response into its header and readings.
pub fn decode(raw: RawResponse, mode: DecodeMode) -> Result<(Header, Readings), DcsError> {
    let reader = raw.into_body_reader()?;
    match mode {
        DecodeMode::Streaming => decode_streaming(reader),
        DecodeMode::Eager => decode_eager(reader),
    }
}

#[cfg(feature = "streaming")]
fn decode_streaming(
    reader: Box<dyn std::io::BufRead + Send>,
) -> Result<(Header, Readings), DcsError> {
    crate::io::stream::decode_stream(reader)
}

#[cfg(not(feature = "streaming"))]
fn decode_streaming(
    reader: Box<dyn std::io::BufRead + Send>,
) -> Result<(Header, Readings), DcsError> {
    log::warn!("Streaming decode not compiled in; reading the whole body");
    decode_eager(reader)
}

/// Read the whole body, then decode it.
pub fn decode_eager(mut reader: impl Read) -> Result<(Header, Readings), DcsError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| DcsError::request(None, format!("failed reading response body: {e}")))?;

    let clean = scanner::sanitize_document(&bytes)?;
    let doc: serde_json::Map<String, Value> = serde_json::from_slice(&clean)
        .map_err(|e| DcsError::Decode(format!("invalid readings payload: {e}")))?;

    // Only fields ahead of `readings` count as header, same as the streaming path.
    let mut header = Header::new();
    let mut items = None;
    for (key, value) in doc {
        if key == "readings" {
            items = Some(value);
            break;
        }
        header.insert(key, value);
    }

    let readings = match items {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|item| {
                let wire: WireReading = serde_json::from_value(item)
                    .map_err(|e| DcsError::Decode(format!("invalid reading: {e}")))?;
                wire.into_reading()
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => {
            return Err(DcsError::Decode(format!(
                "`readings` must be an array, found {other}"
            )));
        }
    };

    log::debug!("Decoded {} readings eagerly", readings.len());
    Ok((header, Readings::Collected(readings)))
}

/// Decode one reading from the raw bytes of an array element.
pub(crate) fn decode_reading(raw: &[u8]) -> Result<Reading, DcsError> {
    let wire: WireReading = serde_json::from_slice(raw)
        .map_err(|e| DcsError::Decode(format!("invalid reading: {e}")))?;
    wire.into_reading()
}

#[derive(Debug, Deserialize)]
struct WireReading {
    timestamp: String,
    #[serde(alias = "totalValue", deserialize_with = "de_value")]
    value: f64,
    #[serde(default)]
    status: Option<i64>,
}

impl WireReading {
    fn into_reading(self) -> Result<Reading, DcsError> {
        Ok(Reading {
            timestamp: parse_timestamp(&self.timestamp)?,
            value: self.value,
            status: self.status,
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireValue {
    Number(f64),
    Text(String),
}

pub(crate) fn de_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Option::<WireValue>::deserialize(deserializer)? {
        None => Ok(f64::NAN),
        Some(WireValue::Number(v)) => Ok(v),
        Some(WireValue::Text(s)) => parse_value(&s)
            .ok_or_else(|| D::Error::custom(format!("invalid numeric value '{s}'"))),
    }
}

/// Numeric text including the non-finite spellings the server may send.
pub fn parse_value(raw: &str) -> Option<f64> {
    match raw.trim() {
        "NaN" | "nan" => Some(f64::NAN),
        "Infinity" | "+Infinity" | "inf" => Some(f64::INFINITY),
        "-Infinity" | "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse::<f64>().ok(),
    }
}

/// Parse a server timestamp as a UTC instant.
///
/// Accepts RFC 3339 (`Z` or numeric offset, optional fraction), a compact
/// `+hhmm` offset, or a naive `YYYY-MM-DDTHH:MM:SS[.ffffff]` taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DcsError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| DcsError::Decode(format!("invalid timestamp '{raw}': {e}")))
}
