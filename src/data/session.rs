//! Shared, authenticated connection to one DCS server.
//!
//! A `Session` is handed around as `Arc<Session>`. Requests through it are
//! serialized by an internal lock, held only until response headers arrive so
//! a streamed body is read outside the critical section.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

use crate::data::config::ClientConfig;
use crate::error::DcsError;

/// Bounded exponential backoff for transient failures.
///
/// Attempt `k` (0-based) waits `0` for the first try and `unit * 2^(k-1)`
/// afterwards, so five attempts at one second wait 0, 1, 2, 4 and 8 seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// One try, no waiting.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            unit: Duration::ZERO,
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            self.unit.saturating_mul(1u32 << (attempt - 1).min(16))
        }
    }
}

/// Gateway statuses that are retried before giving up.
pub fn is_retryable(status: u16) -> bool {
    matches!(status, 502 | 503 | 504)
}

/// Who the server thinks we are.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub username: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
struct LoginReply {
    username: String,
    role: String,
}

pub struct Session {
    client: Client,
    api_root: String,
    retry: RetryPolicy,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn open(config: &ClientConfig) -> Result<Self, DcsError> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(|e| DcsError::request(None, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_root: format!("{}/api", config.url.trim_end_matches('/')),
            retry: config.retry,
            state: Mutex::new(SessionState::default()),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_root)
    }

    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.lock().username.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Send one request built by `build`, retrying gateway errors and
    /// transport failures.
    ///
    /// Returns only successful responses; every other status becomes
    /// `DcsError::Request` carrying the server's body text.
    pub fn send<F>(&self, build: F) -> Result<Response, DcsError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        self.send_with(self.retry, build)
    }

    fn send_with<F>(&self, retry: RetryPolicy, build: F) -> Result<Response, DcsError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let _guard = self.lock();
        let attempts = retry.attempts.max(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            let delay = retry.delay(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            match build(&self.client).send() {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if is_retryable(resp.status().as_u16()) => {
                    let status = resp.status();
                    log::warn!(
                        "DCS responded {status} for {} (attempt {}/{attempts})",
                        resp.url(),
                        attempt + 1
                    );
                    last_err = Some(DcsError::request(Some(status.as_u16()), status.to_string()));
                }
                Ok(resp) => return Err(error_from_response(resp)),
                Err(err) => {
                    log::warn!("DCS request error (attempt {}/{attempts}): {err}", attempt + 1);
                    last_err = Some(DcsError::request(
                        err.status().map(|s| s.as_u16()),
                        err.to_string(),
                    ));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| DcsError::request(None, "no attempts made")))
    }

    /// Authenticate; the server's cookie is kept for later requests.
    pub fn login(&self, username: &str, password: &str) -> Result<SessionState, DcsError> {
        if self.is_logged_in() {
            self.logout()?;
        }
        let body = serde_json::json!({ "username": username, "password": password });
        let url = self.url("/account/login/");
        let resp = self.send(|c| c.post(&url).json(&body))?;
        let reply: LoginReply = resp
            .json()
            .map_err(|e| DcsError::Decode(format!("invalid login reply: {e}")))?;

        log::info!(
            "Logged in to DCS as '{}' with {} privileges",
            reply.username,
            reply.role
        );
        let mut state = self.lock();
        state.username = Some(reply.username);
        state.role = Some(reply.role);
        Ok(state.clone())
    }

    pub fn logout(&self) -> Result<(), DcsError> {
        self.logout_with(self.retry)
    }

    fn logout_with(&self, retry: RetryPolicy) -> Result<(), DcsError> {
        let url = self.url("/account/logout/");
        self.send_with(retry, |c| c.post(&url))?;
        *self.lock() = SessionState::default();
        log::info!("Logged out of DCS");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.is_logged_in() {
            // Teardown should not sit through the backoff.
            if let Err(err) = self.logout_with(RetryPolicy::once()) {
                log::debug!("Logout on drop failed: {err}");
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api_root", &self.api_root)
            .field("retry", &self.retry)
            .field("state", &*self.lock())
            .finish_non_exhaustive()
    }
}

fn error_from_response(resp: Response) -> DcsError {
    let status = resp.status();
    let url = resp.url().to_string();
    let text = resp.text().unwrap_or_default();
    let text = text.trim();
    let message = if text.is_empty() {
        format!("{status} from {url}")
    } else {
        format!("{status} from {url}: {text}")
    };
    DcsError::request(Some(status.as_u16()), message)
}
