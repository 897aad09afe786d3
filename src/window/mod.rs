//! Request window planning.
//!
//! - range alignment and calendar arithmetic (`calendar`)
//! - splitting a range into server-legal windows (`planner`)

pub mod calendar;
pub mod planner;

pub use planner::plan;
