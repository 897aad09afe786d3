//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - plans request windows
//! - fetches and decodes readings
//! - derives period records
//! - prints summaries and writes optional exports

use clap::Parser;

use crate::cli::{CalibrationArgs, Command, RangeArgs, ReadingsArgs};
use crate::data::{ClientConfig, DcsClient, DcsPro};
use crate::domain::FetchMode;
use crate::error::AppError;
use crate::report::{PeriodsTally, ReadingsTally};

pub mod pipeline;

/// Entry point for the `dcs` binary.
pub fn run() -> Result<(), AppError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Plan(args) => handle_plan(&args),
        Command::Readings(args) => handle_readings(&args),
        Command::Calibration(args) => handle_calibration(&args),
    }
}

fn handle_plan(args: &RangeArgs) -> Result<(), AppError> {
    let windows = crate::window::plan(args.start, args.end, args.period, args.max_window())?;
    print!("{}", crate::report::format_windows(&windows));
    Ok(())
}

fn handle_readings(args: &ReadingsArgs) -> Result<(), AppError> {
    let request = args.to_request();
    let mode = if args.eager { FetchMode::Eager } else { FetchMode::Lazy };

    // Validate the range before touching the network.
    crate::window::plan(request.start, request.end, request.cadence, request.max_window)?;

    let client = DcsClient::connect(&ClientConfig::from_env()?)?;
    let result = client.large_readings(&request, mode)?;

    let header = result.header.clone();
    let (start_time, end_time) = (result.start_time, result.end_time);
    let mut readings_tally = ReadingsTally::default();
    let mut periods_tally = PeriodsTally::default();

    {
        let readings = result.readings.into_iter().inspect(|r| {
            if let Ok(reading) = r {
                readings_tally.observe(reading);
            }
        });

        if args.periods {
            let records = crate::period::derive_periods_with(readings, request.cadence, args.gap_policy)
                .inspect(|r| {
                    if let Ok(record) = r {
                        periods_tally.observe(record);
                    }
                });
            match &args.export {
                Some(path) => {
                    let n = crate::io::write_periods_csv(path, records)?;
                    log::info!("Wrote {n} period record(s) to {}", path.display());
                }
                None => drain(records)?,
            }
        } else {
            match &args.export {
                Some(path) => {
                    let n = crate::io::write_readings_csv(path, readings)?;
                    log::info!("Wrote {n} reading(s) to {}", path.display());
                }
                None => drain(readings)?,
            }
        }
    }

    print!(
        "{}",
        crate::report::format_fetch_summary(&header, start_time, end_time, &readings_tally)
    );
    if args.periods {
        print!("{}", crate::report::format_periods_summary(&periods_tally));
    }
    Ok(())
}

fn handle_calibration(args: &CalibrationArgs) -> Result<(), AppError> {
    let client = DcsClient::connect(&ClientConfig::from_env()?)?;
    let pro = DcsPro::new(&client);
    let readings = pro.calibration_readings(&args.register_id, args.start_index, args.max_count)?;
    print!("{}", crate::report::format_calibration(&readings));
    Ok(())
}

/// Pull a sequence to the end, surfacing its first error.
fn drain<T>(items: impl Iterator<Item = Result<T, crate::error::DcsError>>) -> Result<(), AppError> {
    for item in items {
        item?;
    }
    Ok(())
}
