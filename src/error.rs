//! Error types.
//!
//! - `DcsError` is the library taxonomy: planning, request and decode failures.
//! - `AppError` is what the `dcs` binary reports, carrying a process exit code.

use thiserror::Error;

/// Failures raised by planning, fetching, decoding and period derivation.
#[derive(Debug, Error)]
pub enum DcsError {
    /// Window boundaries or anchor spacing do not match the cadence.
    #[error("alignment error: {0}")]
    Alignment(String),

    /// Degenerate, reversed or out-of-order range.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Non-recoverable HTTP status, or a transport failure after retries.
    #[error("request failed{}: {message}", fmt_status(.status))]
    Request { status: Option<u16>, message: String },

    /// Malformed payload.
    #[error("decode error: {0}")]
    Decode(String),
}

impl DcsError {
    pub fn request(status: Option<u16>, message: impl Into<String>) -> Self {
        DcsError::Request {
            status,
            message: message.into(),
        }
    }

    /// HTTP status carried by a `Request` error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            DcsError::Request { status, .. } => *status,
            _ => None,
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<DcsError> for AppError {
    fn from(err: DcsError) -> Self {
        // Bad input exits 2, data source failures exit 4.
        let exit_code = match err {
            DcsError::Alignment(_) | DcsError::InvalidRange(_) => 2,
            DcsError::Request { .. } | DcsError::Decode(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_error_message_includes_status() {
        let err = DcsError::request(Some(404), "Register not found");
        assert_eq!(err.to_string(), "request failed with status 404: Register not found");
        assert_eq!(err.status(), Some(404));

        let err = DcsError::request(None, "connection reset");
        assert_eq!(err.to_string(), "request failed: connection reset");
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        assert_eq!(AppError::from(DcsError::Alignment("x".into())).exit_code(), 2);
        assert_eq!(AppError::from(DcsError::Decode("x".into())).exit_code(), 4);
    }
}
