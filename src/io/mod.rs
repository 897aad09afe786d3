//! Input/output helpers.
//!
//! - raw responses and content decompression (`raw`)
//! - readings payload decoding, streamed or eager (`decode`)
//! - CSV exports (`export`)

pub mod decode;
pub mod export;
pub mod raw;
mod scanner;
#[cfg(feature = "streaming")]
mod stream;

pub use decode::{decode, parse_timestamp};
pub use export::*;
pub use raw::RawResponse;
