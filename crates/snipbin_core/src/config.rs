//! Configuration loading from environment variables.

use crate::constants::{DEFAULT_DB_FILE_NAME, DEFAULT_PORT, DEFAULT_WEBHOOK_TIMEOUT};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for snipbin.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub port: u16,
    /// Maximum document length in characters; `0` disables the limit.
    pub max_document_size: usize,
    /// Age after which document versions are deleted; zero disables expiry.
    pub expire_after: Duration,
    pub cleanup_interval: Duration,
    pub jwt_secret: String,
    pub webhook_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            port: DEFAULT_PORT,
            max_document_size: 0,
            expire_after: Duration::ZERO,
            cleanup_interval: Duration::from_secs(60),
            jwt_secret: String::new(),
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

fn default_db_path() -> String {
    let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".cache")
        .join("snipbin")
        .join(DEFAULT_DB_FILE_NAME)
        .to_string_lossy()
        .to_string()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

/// Parse a whole number of seconds.
///
/// Negative values clamp to zero so callers can treat "non-positive" uniformly.
///
/// # Returns
/// `None` when the value is not an integer.
pub fn parse_seconds(value: &str) -> Option<Duration> {
    let seconds: i64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(seconds.max(0) as u64))
}

fn env_seconds(name: &str, default: Duration) -> Duration {
    match env::var(name) {
        Ok(value) => parse_seconds(&value).unwrap_or_else(|| {
            tracing::warn!("Invalid {}='{}'; using {:?}", name, value, default);
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            db_path: env::var("DB_PATH")
                .map(expand_tilde)
                .unwrap_or(defaults.db_path),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            max_document_size: env::var("MAX_DOCUMENT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_document_size),
            expire_after: env_seconds("EXPIRE_AFTER", defaults.expire_after),
            cleanup_interval: env_seconds("CLEANUP_INTERVAL", defaults.cleanup_interval),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            webhook_timeout: env_seconds("WEBHOOK_TIMEOUT", defaults.webhook_timeout),
        }
    }
}
