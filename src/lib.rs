//! `dcs-readings` library crate.
//!
//! The binary (`dcs`) is a thin wrapper around this library so that:
//!
//! - planning, decoding and period derivation are testable without a server
//! - the pipeline is reusable by other consumers (database loaders, notebooks)
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod io;
pub mod period;
pub mod report;
pub mod window;
