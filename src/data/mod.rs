//! DCS server access.
//!
//! - `config`: connection settings from the environment
//! - `session`: shared authenticated connection with retry and locking
//! - `client`: readings endpoints, the live `WindowSource`
//! - `pro`: calibration readings over the same session

pub mod client;
pub mod config;
pub mod pro;
pub mod session;

pub use client::{DcsClient, MeterId};
pub use config::ClientConfig;
pub use pro::{CalibrationReading, DcsPro};
pub use session::{RetryPolicy, Session, SessionState};
