//! `dcs` command-line entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    if let Err(err) = dcs_readings::app::run() {
        eprintln!("dcs: {err}");
        return ExitCode::from(err.exit_code());
    }
    ExitCode::SUCCESS
}
