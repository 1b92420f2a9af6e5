//! Console configuration parsed from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const SESSION_FILE_NAME: &str = "session.json";
const FALLBACK_SESSION_FILE: &str = ".continuum-session.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// Applied to ordinary calls. File transfers are not time-limited.
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub base_url: String,
    pub session_file: PathBuf,
    pub poll_interval: Duration,
    pub timeouts: HttpTimeouts,
}

impl ConsoleConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `CONTINUUM_BASE_URL`: backend origin, default `http://localhost:5000`
    /// - `CONTINUUM_SESSION_FILE`: default `<config dir>/continuum/session.json`
    /// - `CONTINUUM_POLL_INTERVAL_SECS`: default 5, minimum 1
    /// - `CONTINUUM_REQUEST_TIMEOUT_SECS`: default 60
    /// - `CONTINUUM_CONNECT_TIMEOUT_SECS`: default 10
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("CONTINUUM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let session_file = std::env::var_os("CONTINUUM_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(default_session_file);
        let poll_secs = env_parse("CONTINUUM_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS).max(1);

        Self {
            base_url: normalize_base_url(&base_url),
            session_file,
            poll_interval: Duration::from_secs(poll_secs),
            timeouts: HttpTimeouts {
                request_secs: env_parse("CONTINUUM_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
                connect_secs: env_parse("CONTINUUM_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = normalize_base_url(base_url);
        self
    }

    #[must_use]
    pub fn with_session_file(mut self, path: PathBuf) -> Self {
        self.session_file = path;
        self
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            session_file: default_session_file(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            timeouts: HttpTimeouts {
                request_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
                connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
        }
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_owned()
}

fn default_session_file() -> PathBuf {
    ProjectDirs::from("", "", "continuum").map_or_else(
        || PathBuf::from(FALLBACK_SESSION_FILE),
        |dirs| dirs.config_dir().join(SESSION_FILE_NAME),
    )
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
