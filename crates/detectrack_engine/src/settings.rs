use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

const ENV_API_URL: &str = "DETECTRACK_API_URL";
const ENV_POLL_INTERVAL_MS: &str = "DETECTRACK_POLL_INTERVAL_MS";
const ENV_REQUEST_TIMEOUT_MS: &str = "DETECTRACK_REQUEST_TIMEOUT_MS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{key} is not a valid http(s) url: {value}")]
    InvalidUrl { key: &'static str, value: String },
    #[error("{key} must be a positive number of milliseconds, got {value:?}")]
    InvalidMillis { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Service root; endpoints live under `{base_url}/detection/`.
    pub base_url: Url,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl TransportSettings {
    /// Default timeouts against `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// A service on `http://localhost:8000/api/v1`.
    pub fn local() -> Result<Self, SettingsError> {
        parse_base_url(ENV_API_URL, DEFAULT_BASE_URL).map(Self::new)
    }

    pub(crate) fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Delay between a status answer and the next status request.
    pub poll_interval: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub transport: TransportSettings,
    pub controller: ControllerSettings,
}

impl ClientSettings {
    /// Load settings from the process environment, falling back to defaults
    /// for unset variables.
    ///
    /// - `DETECTRACK_API_URL`: service root (default `http://localhost:8000/api/v1`)
    /// - `DETECTRACK_POLL_INTERVAL_MS`: status poll interval (default 1000)
    /// - `DETECTRACK_REQUEST_TIMEOUT_MS`: per-request timeout (default 30000)
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let base_url = lookup(ENV_API_URL);
        let base_url = base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let base_url = parse_base_url(ENV_API_URL, base_url)?;
        let mut settings = Self {
            transport: TransportSettings::new(base_url),
            controller: ControllerSettings::default(),
        };

        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            settings.controller.poll_interval = parse_millis(ENV_POLL_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            settings.transport.request_timeout = parse_millis(ENV_REQUEST_TIMEOUT_MS, &value)?;
        }

        Ok(settings)
    }
}

fn parse_base_url(key: &'static str, value: &str) -> Result<Url, SettingsError> {
    let invalid = || SettingsError::InvalidUrl {
        key,
        value: value.to_string(),
    };
    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(url)
}

fn parse_millis(key: &'static str, value: &str) -> Result<Duration, SettingsError> {
    match value.trim().parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(SettingsError::InvalidMillis {
            key,
            value: value.to_string(),
        }),
    }
}
