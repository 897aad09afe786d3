//! Connection settings read from the environment (or `.env`).

use std::time::Duration;

use crate::data::session::RetryPolicy;
use crate::error::AppError;

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RETRY_ATTEMPTS: u64 = 5;
const DEFAULT_RETRY_UNIT_SECS: u64 = 1;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root; the API lives under `<url>/api`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let url = get("DCS_URL")
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| AppError::new(2, "Missing DCS_URL in environment (.env)."))?;

        let mut config = Self::new(url.trim());
        config.username = get("DCS_USERNAME").filter(|s| !s.is_empty());
        config.password = get("DCS_PASSWORD").filter(|s| !s.is_empty());
        config.connect_timeout = Duration::from_secs(number(
            &get,
            "DCS_CONNECT_TIMEOUT_SECS",
            DEFAULT_CONNECT_TIMEOUT_SECS,
        )?);
        config.read_timeout =
            Duration::from_secs(number(&get, "DCS_READ_TIMEOUT_SECS", DEFAULT_READ_TIMEOUT_SECS)?);

        let attempts = number(&get, "DCS_RETRY_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS)?;
        if attempts == 0 {
            return Err(AppError::new(2, "DCS_RETRY_ATTEMPTS must be at least 1."));
        }
        config.retry = RetryPolicy {
            attempts: u32::try_from(attempts)
                .map_err(|_| AppError::new(2, "DCS_RETRY_ATTEMPTS is too large."))?,
            unit: Duration::from_secs(number(&get, "DCS_RETRY_UNIT_SECS", DEFAULT_RETRY_UNIT_SECS)?),
        };
        Ok(config)
    }

    /// Both halves of the login, if configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

fn number(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64, AppError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::new(2, format!("{key} must be a whole number of seconds, got '{raw}'."))),
    }
}
