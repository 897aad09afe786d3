//! Command-line parsing for the DCS readings tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! planning, fetching and period code.

use std::path::PathBuf;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use crate::domain::{Cadence, GapPolicy, ReadingFlags, ReadingsRequest, Source};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dcs", version, about = "Bulk meter readings from a DCS server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the request windows a range would be split into (no network).
    Plan(RangeArgs),
    /// Fetch readings for a register (`R839`) or virtual meter (`VM88`).
    Readings(ReadingsArgs),
    /// List calibration readings for a register.
    Calibration(CalibrationArgs),
}

/// Range, cadence and window size shared by `plan` and `readings`.
#[derive(Debug, Args, Clone)]
pub struct RangeArgs {
    /// Range start, `YYYY-MM-DD` or RFC 3339.
    #[arg(long, value_parser = parse_instant)]
    pub start: DateTime<Utc>,

    /// Range end (exclusive), `YYYY-MM-DD` or RFC 3339.
    #[arg(long, value_parser = parse_instant)]
    pub end: DateTime<Utc>,

    /// Reading cadence.
    #[arg(long, value_enum, default_value_t = Cadence::HalfHour)]
    pub period: Cadence,

    /// Largest span, in days, the server accepts in one request.
    #[arg(long, default_value_t = 365)]
    pub max_window_days: u32,
}

impl RangeArgs {
    pub fn max_window(&self) -> Duration {
        Duration::days(i64::from(self.max_window_days))
    }
}

#[derive(Debug, Args, Clone)]
pub struct ReadingsArgs {
    /// Register or virtual meter id.
    pub id: String,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Collect every window before returning instead of streaming.
    #[arg(long)]
    pub eager: bool,

    /// Derive per-period consumption from the cumulative readings.
    #[arg(long)]
    pub periods: bool,

    /// What to do with gaps that are not a whole number of periods.
    #[arg(long, value_enum, default_value_t = GapPolicy::Truncate)]
    pub gap_policy: GapPolicy,

    /// Request uncalibrated values.
    #[arg(long)]
    pub uncalibrated: bool,

    /// Ask the server not to fill gaps itself.
    #[arg(long)]
    pub no_interpolation: bool,

    /// Timestamps in server local time instead of UTC.
    #[arg(long)]
    pub local_time: bool,

    #[arg(long, value_enum, default_value_t = Source::Automatic)]
    pub source: Source,

    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u8).range(0..=15))]
    pub decimal_places: u8,

    /// Write readings (or period records with `--periods`) to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

impl ReadingsArgs {
    pub fn to_request(&self) -> ReadingsRequest {
        ReadingsRequest {
            id: self.id.clone(),
            start: self.range.start,
            end: self.range.end,
            cadence: self.range.period,
            max_window: self.range.max_window(),
            flags: ReadingFlags {
                calibrated: !self.uncalibrated,
                interpolated: !self.no_interpolation,
                use_local_time: self.local_time,
                source: self.source,
                decimal_places: self.decimal_places,
            },
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct CalibrationArgs {
    /// Register id, e.g. `R839`.
    pub register_id: String,

    #[arg(long, default_value_t = 0)]
    pub start_index: u32,

    #[arg(long, default_value_t = crate::data::pro::MAX_CALIBRATION_COUNT)]
    pub max_count: u32,
}

/// `YYYY-MM-DD` (midnight UTC) or an RFC 3339 instant.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected YYYY-MM-DD or RFC 3339, got '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn dates_and_instants_parse_as_utc() {
        assert_eq!(
            parse_instant("2022-01-01").unwrap(),
            Utc.with_ymd_and_hms(2022, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(
            parse_instant("2022-01-01T01:30:00+01:00").unwrap(),
            Utc.with_ymd_and_hms(2022, 1, 1, 0, 30, 0).unwrap()
        );
        assert!(parse_instant("01/02/2022").is_err());
    }

    #[test]
    fn readings_args_build_a_request() {
        let cli = Cli::try_parse_from([
            "dcs",
            "readings",
            "VM88",
            "--start",
            "2021-01-01",
            "--end",
            "2022-01-01",
            "--period",
            "month",
            "--max-window-days",
            "90",
            "--periods",
            "--gap-policy",
            "reject",
            "--uncalibrated",
        ])
        .unwrap();

        let Command::Readings(args) = cli.command else {
            panic!("expected readings subcommand");
        };
        assert!(args.periods);
        assert_eq!(args.gap_policy, GapPolicy::Reject);

        let request = args.to_request();
        assert_eq!(request.id, "VM88");
        assert_eq!(request.cadence, Cadence::Month);
        assert_eq!(request.max_window, Duration::days(90));
        assert!(!request.flags.calibrated);
        assert!(request.flags.interpolated);
    }

    #[test]
    fn decimal_places_are_bounded() {
        let res = Cli::try_parse_from([
            "dcs", "readings", "R1", "--start", "2022-01-01", "--end", "2022-01-02",
            "--decimal-places", "16",
        ]);
        assert!(res.is_err());
    }
}
