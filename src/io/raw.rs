//! Raw HTTP responses as handed over by the transport.

use std::io::{BufRead, BufReader, Read};

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::DcsError;

/// Status, headers and an unread body.
pub struct RawResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Box<dyn Read + Send>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Read + Send + 'static) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Box::new(body),
        }
    }

    /// Add a header; names are matched case-insensitively.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.header("content-encoding")
    }

    /// Body reader with any `content-encoding` undone.
    pub fn into_body_reader(self) -> Result<Box<dyn BufRead + Send>, DcsError> {
        let encoding = self
            .content_encoding()
            .map(|e| e.trim().to_ascii_lowercase())
            .unwrap_or_default();
        match encoding.as_str() {
            "" | "identity" => Ok(Box::new(BufReader::new(self.body))),
            "gzip" | "x-gzip" => Ok(Box::new(BufReader::new(GzDecoder::new(self.body)))),
            "deflate" => Ok(Box::new(BufReader::new(ZlibDecoder::new(self.body)))),
            other => Err(DcsError::Decode(format!(
                "unsupported content-encoding '{other}'"
            ))),
        }
    }
}

impl From<reqwest::blocking::Response> for RawResponse {
    fn from(resp: reqwest::blocking::Response) -> Self {
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        Self {
            status,
            headers,
            body: Box::new(resp),
        }
    }
}

impl std::fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}
