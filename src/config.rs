//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::StartupPolicy;

const DEFAULT_DB_PATH: &str = "gym-tracker.db";
const DEFAULT_DEBOUNCE_SECS: u64 = 30;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone)]
pub struct Config {
    /// Supabase project URL, without the `/rest/v1` suffix
    pub supabase_url: String,
    /// Public anon key sent as both `apikey` and bearer token
    pub supabase_anon_key: String,
    pub db_path: PathBuf,
    /// Quiet period after the last change before a push
    pub sync_debounce: Duration,
    pub http_timeout: Duration,
    pub startup_policy: StartupPolicy,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            sync_debounce: Duration::from_secs(DEFAULT_DEBOUNCE_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            startup_policy: StartupPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from the environment, after reading `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let seconds = |key: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid { key, value: raw }),
                None => Ok(default),
            }
        };

        let startup_policy = match lookup("GYM_TRACKER_STARTUP_POLICY") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                key: "GYM_TRACKER_STARTUP_POLICY",
                value: raw,
            })?,
            None => StartupPolicy::default(),
        };

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?,
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            db_path: lookup("GYM_TRACKER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
            sync_debounce: Duration::from_secs(
                seconds("GYM_TRACKER_SYNC_DEBOUNCE_SECS", DEFAULT_DEBOUNCE_SECS)?.max(1),
            ),
            http_timeout: Duration::from_secs(seconds(
                "GYM_TRACKER_HTTP_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
            startup_policy,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
