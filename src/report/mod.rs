//! Reporting utilities: running tallies and formatted terminal output.
//!
//! Tallies are fed one item at a time so a streamed request can be summarized
//! without holding it in memory.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::data::CalibrationReading;
use crate::domain::{Header, PeriodRecord, Reading, Window};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingsTally {
    pub count: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// NaN or infinite values.
    pub non_finite: usize,
}

impl ReadingsTally {
    pub fn observe(&mut self, reading: &Reading) {
        self.count += 1;
        self.first.get_or_insert(reading.timestamp);
        self.last = Some(reading.timestamp);
        if !reading.value.is_finite() {
            self.non_finite += 1;
            return;
        }
        self.min_value = Some(self.min_value.map_or(reading.value, |m| m.min(reading.value)));
        self.max_value = Some(self.max_value.map_or(reading.value, |m| m.max(reading.value)));
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodsTally {
    pub count: usize,
    pub synthesized: usize,
    /// Sum of finite period values.
    pub total: f64,
}

impl PeriodsTally {
    pub fn observe(&mut self, record: &PeriodRecord) {
        self.count += 1;
        if record.is_synthesized() {
            self.synthesized += 1;
        }
        if let Some(v) = record.period_value.filter(|v| v.is_finite()) {
            self.total += v;
        }
    }
}

/// One line per planned window.
pub fn format_windows(windows: &[Window]) -> String {
    let mut out = format!("{} window(s)\n", windows.len());
    for (k, w) in windows.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {} -> {}  ({}d)\n",
            k + 1,
            w.start.to_rfc3339(),
            w.end.to_rfc3339(),
            w.span().num_days()
        ));
    }
    out
}

pub fn format_fetch_summary(
    header: &Header,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    tally: &ReadingsTally,
) -> String {
    let mut out = String::new();

    let name = header.get("name").and_then(Value::as_str).unwrap_or("-");
    let id = header.get("id").map(scalar).unwrap_or_else(|| "-".to_string());
    out.push_str(&format!("=== {id}: {name} ===\n"));
    out.push_str(&format!("Range: {} -> {}\n", start_time.to_rfc3339(), end_time.to_rfc3339()));

    let mut other: Vec<String> = header
        .iter()
        .filter(|(k, v)| !matches!(k.as_str(), "id" | "name" | "startTime" | "endTime") && !v.is_array())
        .map(|(k, v)| format!("{k}={}", scalar(v)))
        .collect();
    if !other.is_empty() {
        other.sort_unstable();
        out.push_str(&format!("Header: {}\n", other.join(", ")));
    }

    out.push_str(&format!("Readings: n={}", tally.count));
    if let (Some(first), Some(last)) = (tally.first, tally.last) {
        out.push_str(&format!(" | {} .. {}", first.to_rfc3339(), last.to_rfc3339()));
    }
    out.push('\n');
    if let (Some(lo), Some(hi)) = (tally.min_value, tally.max_value) {
        out.push_str(&format!("Values: [{lo:.3}, {hi:.3}]"));
        if tally.non_finite > 0 {
            out.push_str(&format!(" | non-finite={}", tally.non_finite));
        }
        out.push('\n');
    }
    out
}

pub fn format_periods_summary(tally: &PeriodsTally) -> String {
    format!(
        "Periods: n={} | synthesized={} | total={:.3}\n",
        tally.count, tally.synthesized, tally.total
    )
}

pub fn format_calibration(readings: &[CalibrationReading]) -> String {
    let mut out = format!("{} calibration reading(s)\n", readings.len());
    for r in readings {
        out.push_str(&format!(
            "{}  (from {})  {}\n",
            r.timestamp.to_rfc3339(),
            r.start_time.to_rfc3339(),
            r.value
        ));
    }
    out
}

fn scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
