//! Undocumented endpoints, layered over a client's session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::client::{DcsClient, MeterId};
use crate::data::session::Session;
use crate::error::DcsError;
use crate::io::parse_timestamp;

/// Largest page the calibration endpoint accepts.
pub const MAX_CALIBRATION_COUNT: u32 = i32::MAX as u32;

/// A manual meter read used to calibrate a register.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationReading {
    pub timestamp: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub value: f64,
}

#[derive(Deserialize)]
struct CalibrationReply {
    #[serde(rename = "calibrationReadings", default)]
    readings: Vec<WireCalibration>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCalibration {
    timestamp: String,
    start_time: String,
    #[serde(deserialize_with = "crate::io::decode::de_value")]
    value: f64,
}

pub struct DcsPro {
    session: Arc<Session>,
}

impl DcsPro {
    pub fn new(client: &DcsClient) -> Self {
        Self {
            session: Arc::clone(client.session()),
        }
    }

    pub fn calibration_readings(
        &self,
        register_id: &str,
        start_index: u32,
        max_count: u32,
    ) -> Result<Vec<CalibrationReading>, DcsError> {
        let register = match MeterId::parse(register_id) {
            MeterId::Register(n) => n,
            MeterId::Virtual(_) => {
                return Err(DcsError::request(
                    None,
                    format!("calibration readings exist only for registers, not {register_id}"),
                ));
            }
        };
        let url = self.session.url("/CalibrationReadings/");
        let params = [
            ("registerId", register.to_string()),
            ("startIndex", start_index.to_string()),
            ("maxCount", max_count.min(MAX_CALIBRATION_COUNT).to_string()),
        ];
        let body = self
            .session
            .send(|c| c.get(&url).query(&params))?
            .text()
            .map_err(|e| DcsError::request(None, format!("failed to read calibration reply: {e}")))?;
        parse_calibration(&body)
    }
}

fn parse_calibration(body: &str) -> Result<Vec<CalibrationReading>, DcsError> {
    let reply: CalibrationReply = serde_json::from_str(body)
        .map_err(|e| DcsError::Decode(format!("invalid calibration reply: {e}")))?;
    reply
        .readings
        .into_iter()
        .map(|w| {
            Ok(CalibrationReading {
                timestamp: parse_timestamp(&w.timestamp)?,
                start_time: parse_timestamp(&w.start_time)?,
                value: w.value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn calibration_timestamps_with_and_without_fraction() {
        let body = r#"{
            "totalCount": 2,
            "calibrationReadings": [
                {"id": 1, "timestamp": "2021-06-01T09:30:00", "startTime": "2021-05-01T00:00:00", "value": 1520.5},
                {"id": 2, "timestamp": "2021-07-01T09:30:00.123", "startTime": "2021-06-01T09:30:00", "value": "1610"}
            ]
        }"#;
        let readings = parse_calibration(body).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].timestamp, Utc.with_ymd_and_hms(2021, 6, 1, 9, 30, 0).unwrap());
        assert_eq!(readings[0].value, 1520.5);
        assert_eq!(readings[1].start_time, readings[0].timestamp);
        assert_eq!(readings[1].timestamp.timestamp_subsec_millis(), 123);
        assert_eq!(readings[1].value, 1610.0);
    }

    #[test]
    fn missing_list_is_empty_and_bad_json_is_a_decode_error() {
        assert!(parse_calibration("{}").unwrap().is_empty());
        assert!(matches!(parse_calibration("[1,"), Err(DcsError::Decode(_))));
    }
}
