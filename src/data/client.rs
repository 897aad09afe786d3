//! Readings endpoints of the DCS API.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::app::pipeline;
use crate::data::config::ClientConfig;
use crate::data::session::{Session, SessionState};
use crate::domain::{Cadence, DecodeMode, FetchMode, FetchResult, ReadingFlags, ReadingsRequest, Window};
use crate::error::DcsError;
use crate::fetch::{WindowSource, fetch_one};
use crate::io::RawResponse;

/// A register (`R839`, `839`) or virtual meter (`VM88`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterId<'a> {
    Register(&'a str),
    Virtual(&'a str),
}

impl<'a> MeterId<'a> {
    pub fn parse(id: &'a str) -> Self {
        let id = id.trim();
        let upper = id.get(..2).map(str::to_ascii_uppercase);
        if upper.as_deref() == Some("VM") {
            return MeterId::Virtual(&id[2..]);
        }
        match id.strip_prefix('R').or_else(|| id.strip_prefix('r')) {
            Some(rest) => MeterId::Register(rest),
            None => MeterId::Register(id),
        }
    }

    fn endpoint(self) -> (&'static str, &'static str, &'a str) {
        match self {
            MeterId::Register(n) => ("/registerReadings/list/", "registerId", n),
            MeterId::Virtual(n) => ("/VirtualMeterReadings/list/", "virtualMeterId", n),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DcsClient {
    session: Arc<Session>,
}

impl DcsClient {
    /// Open a session and log in when the config carries credentials.
    pub fn connect(config: &ClientConfig) -> Result<Self, DcsError> {
        let session = Arc::new(Session::open(config)?);
        match config.credentials() {
            Some((username, password)) => {
                session.login(username, password)?;
            }
            None => log::info!("{}; continuing without login", missing_credentials(config)),
        }
        Ok(Self { session })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn login(&self, username: &str, password: &str) -> Result<SessionState, DcsError> {
        self.session.login(username, password)
    }

    pub fn logout(&self) -> Result<(), DcsError> {
        self.session.logout()
    }

    /// Readings for a single window, as the server returns them.
    pub fn readings(
        &self,
        id: &str,
        window: &Window,
        cadence: Cadence,
        flags: &ReadingFlags,
        mode: DecodeMode,
    ) -> Result<FetchResult, DcsError> {
        fetch_one(self, id, window, cadence, flags, mode)
    }

    /// Readings for an arbitrarily long range, split into server-sized windows.
    pub fn large_readings(&self, request: &ReadingsRequest, mode: FetchMode) -> Result<FetchResult, DcsError> {
        pipeline::large_readings(self.clone(), request, mode)
    }
}

impl WindowSource for DcsClient {
    fn fetch_window(
        &self,
        id: &str,
        window: &Window,
        cadence: Cadence,
        flags: &ReadingFlags,
    ) -> Result<RawResponse, DcsError> {
        let (path, id_key, number) = MeterId::parse(id).endpoint();
        let url = self.session.url(path);
        let mut params = vec![(id_key, number.to_string())];
        params.extend(readings_query(window, cadence, flags));

        let started = std::time::Instant::now();
        let resp = self.session.send(|c| c.get(&url).query(&params))?;
        log::info!(
            "Got readings for {id} ({} -> {}), server response time: {:.3}s",
            window.start,
            window.end,
            started.elapsed().as_secs_f64()
        );
        Ok(RawResponse::from(resp))
    }
}

fn missing_credentials(config: &ClientConfig) -> &'static str {
    if config.username.is_none() && config.password.is_none() {
        "No credentials configured"
    } else {
        "Incomplete credentials given"
    }
}

fn iso(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Query parameters shared by register and virtual meter readings.
pub fn readings_query(window: &Window, cadence: Cadence, flags: &ReadingFlags) -> Vec<(&'static str, String)> {
    vec![
        ("start", iso(window.start)),
        ("end", iso(window.end)),
        ("integrationPeriod", cadence.wire_name().to_string()),
        ("calibrated", flags.calibrated.to_string()),
        ("interpolated", flags.interpolated.to_string()),
        ("useLocalTime", flags.use_local_time.to_string()),
        ("source", flags.source.wire_name().to_string()),
        ("decimalPlaces", flags.decimal_places.min(15).to_string()),
    ]
}
