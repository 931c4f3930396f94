//! Backend and live sync configuration.
//!
//! `BackendConfig` locates the hosted Supabase project; `SyncTuning` holds the
//! knobs of the push/polling synchronization. Both can be loaded from the
//! environment and are validated before use.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_SUPABASE_URL: &str = "RENTDESK_SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "RENTDESK_SUPABASE_ANON_KEY";
const ENV_STORAGE_BUCKET: &str = "RENTDESK_STORAGE_BUCKET";
const ENV_GUARD_SECS: &str = "RENTDESK_GUARD_SECS";
const ENV_POLL_SECS: &str = "RENTDESK_POLL_SECS";

const DEFAULT_STORAGE_BUCKET: &str = "vehicle-images";
const DEFAULT_GUARD_WINDOW_SECS: u64 = 10;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_EVENT_BUFFER: usize = 256;
const DEFAULT_LATEST_UNREAD_CAPACITY: usize = 5;

/// Hosted backend location and public credentials.
///
/// The anon key is a public key; service-role keys must never be stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,
}

impl BackendConfig {
    /// Build a validated config, trimming values and any trailing slash.
    pub fn new(
        supabase_url: impl Into<String>,
        supabase_anon_key: impl Into<String>,
        storage_bucket: Option<String>,
    ) -> Result<Self> {
        let config = Self {
            supabase_url: supabase_url.into(),
            supabase_anon_key: supabase_anon_key.into(),
            storage_bucket: normalize_text_option(storage_bucket)
                .unwrap_or_else(default_storage_bucket),
        };
        config.validated()
    }

    /// Load from `RENTDESK_*` environment variables.
    ///
    /// Returns `Ok(None)` when neither URL nor key is set, and an error when
    /// only one of them is.
    pub fn from_env() -> Result<Option<Self>> {
        parse_backend_config(|key| env::var(key).ok())
    }

    /// Base URL of the PostgREST API.
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.supabase_url)
    }

    /// Base URL of the GoTrue auth API.
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.supabase_url)
    }

    /// Base URL of the storage API.
    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.supabase_url)
    }

    fn validated(self) -> Result<Self> {
        let url = normalize_text_option(Some(self.supabase_url))
            .ok_or_else(|| Error::Config("Supabase URL must not be empty".to_string()))?;
        if !is_http_url(&url) {
            return Err(Error::Config(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        }
        let anon_key = normalize_text_option(Some(self.supabase_anon_key))
            .ok_or_else(|| Error::Config("Supabase anon key must not be empty".to_string()))?;
        let storage_bucket = normalize_text_option(Some(self.storage_bucket))
            .unwrap_or_else(default_storage_bucket);

        Ok(Self {
            supabase_url: url.trim_end_matches('/').to_string(),
            supabase_anon_key: anon_key,
            storage_bucket,
        })
    }
}

/// Timing and buffering knobs for live synchronization.
///
/// The guard window bounds how long the push channel may take to confirm
/// before polling starts; the poll interval is the cadence of the fallback.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncTuning {
    #[serde(default = "default_guard_window", with = "duration_secs")]
    pub guard_window: Duration,
    #[serde(default = "default_poll_interval", with = "duration_secs")]
    pub poll_interval: Duration,
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
    #[serde(default = "default_latest_unread_capacity")]
    pub latest_unread_capacity: usize,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            guard_window: default_guard_window(),
            poll_interval: default_poll_interval(),
            event_buffer: DEFAULT_EVENT_BUFFER,
            latest_unread_capacity: DEFAULT_LATEST_UNREAD_CAPACITY,
        }
    }
}

impl SyncTuning {
    #[must_use]
    pub const fn with_guard_window(mut self, guard_window: Duration) -> Self {
        self.guard_window = guard_window;
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Defaults overlaid with `RENTDESK_GUARD_SECS` / `RENTDESK_POLL_SECS`.
    pub fn from_env() -> Result<Self> {
        parse_sync_tuning(|key| env::var(key).ok())
    }

    pub fn validate(&self) -> Result<()> {
        if self.guard_window.is_zero() {
            return Err(Error::Config("guard window must be non-zero".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(Error::Config("event buffer must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn default_storage_bucket() -> String {
    DEFAULT_STORAGE_BUCKET.to_string()
}

const fn default_guard_window() -> Duration {
    Duration::from_secs(DEFAULT_GUARD_WINDOW_SECS)
}

const fn default_poll_interval() -> Duration {
    Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS)
}

const fn default_event_buffer() -> usize {
    DEFAULT_EVENT_BUFFER
}

const fn default_latest_unread_capacity() -> usize {
    DEFAULT_LATEST_UNREAD_CAPACITY
}

fn parse_backend_config(get: impl Fn(&str) -> Option<String>) -> Result<Option<BackendConfig>> {
    let url = normalize_text_option(get(ENV_SUPABASE_URL));
    let anon_key = normalize_text_option(get(ENV_SUPABASE_ANON_KEY));

    match (url, anon_key) {
        (None, None) => Ok(None),
        (Some(url), Some(anon_key)) => {
            BackendConfig::new(url, anon_key, get(ENV_STORAGE_BUCKET)).map(Some)
        }
        _ => Err(Error::Config(format!(
            "{ENV_SUPABASE_URL} and {ENV_SUPABASE_ANON_KEY} must be set together"
        ))),
    }
}

fn parse_sync_tuning(get: impl Fn(&str) -> Option<String>) -> Result<SyncTuning> {
    let mut tuning = SyncTuning::default();
    if let Some(secs) = parse_secs(&get, ENV_GUARD_SECS)? {
        tuning.guard_window = Duration::from_secs(secs);
    }
    if let Some(secs) = parse_secs(&get, ENV_POLL_SECS)? {
        tuning.poll_interval = Duration::from_secs(secs);
    }
    tuning.validate()?;
    Ok(tuning)
}

fn parse_secs(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = normalize_text_option(get(key)) else {
        return Ok(None);
    };
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a whole number of seconds")))
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
