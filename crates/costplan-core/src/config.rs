//! Runtime settings, read once from the environment at process start.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// File name of the result database when `DB_PATH` is not set.
pub const DEFAULT_DB_FILE: &str = "costplan.db";

/// Credentials and endpoint of the remote planning service.
#[derive(Clone)]
pub struct RemoteSettings {
    /// Base URL, always carrying a scheme.
    pub server: String,
    pub username: String,
    pub password: String,
    pub calls_per_second: f64,
    pub http_timeout: Duration,
    /// Total attempts for a call that keeps failing transiently.
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("calls_per_second", &self.calls_per_second)
            .field("http_timeout", &self.http_timeout)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

/// Top-level costplan configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub remote: RemoteSettings,
    /// SQLite result database.
    pub db_path: PathBuf,
    /// Group ids never processed.
    pub exclude_ids: BTreeSet<String>,
    /// When set, `in_progress` runs older than this are marked failed
    /// before a new run starts.
    pub stale_run_after: Option<Duration>,
}

impl Settings {
    /// Create configuration from the process environment and defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let server = get("REMOTE_SERVER").ok_or_else(|| missing("REMOTE_SERVER"))?;
        let username = get("REMOTE_USERNAME").ok_or_else(|| missing("REMOTE_USERNAME"))?;
        let password = get("REMOTE_PASSWORD").ok_or_else(|| missing("REMOTE_PASSWORD"))?;

        let calls_per_second: f64 = parse_or(get("CALLS_PER_SECOND"), "CALLS_PER_SECOND", 2.0)?;
        if !calls_per_second.is_finite() || calls_per_second <= 0.0 {
            return Err(Error::Config(format!(
                "CALLS_PER_SECOND must be a positive number, got {}",
                calls_per_second
            )));
        }

        let timeout_secs: u64 = parse_or(get("HTTP_TIMEOUT_SECONDS"), "HTTP_TIMEOUT_SECONDS", 30)?;
        if timeout_secs == 0 {
            return Err(Error::Config("HTTP_TIMEOUT_SECONDS must be > 0".into()));
        }

        let max_retries: u32 = parse_or(get("MAX_RETRIES"), "MAX_RETRIES", 3)?;
        if max_retries == 0 {
            return Err(Error::Config("MAX_RETRIES must be at least 1".into()));
        }

        let retry_delay_secs: u64 = parse_or(get("RETRY_DELAY_SECONDS"), "RETRY_DELAY_SECONDS", 5)?;

        let db_path = get("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let exclude_ids = get("EXCLUDE_IDS")
            .map(|raw| parse_id_list(&raw))
            .unwrap_or_default();

        let stale_run_after = match get("STALE_RUN_HOURS") {
            Some(raw) => {
                let hours: u64 = parse_or(Some(raw), "STALE_RUN_HOURS", 0)?;
                Some(hours_to_duration(hours)?)
            }
            None => None,
        };

        Ok(Self {
            remote: RemoteSettings {
                server: normalize_server(&server),
                username,
                password,
                calls_per_second,
                http_timeout: Duration::from_secs(timeout_secs),
                max_retries,
                retry_delay: Duration::from_secs(retry_delay_secs),
            },
            db_path,
            exclude_ids,
            stale_run_after,
        })
    }

    /// Override the database location.
    pub fn with_db_path(mut self, path: impl AsRef<Path>) -> Self {
        self.db_path = path.as_ref().to_path_buf();
        self
    }
}

fn missing(key: &str) -> Error {
    Error::Config(format!("{} environment variable is required", key))
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(v) => v
            .parse()
            .map_err(|e| Error::Config(format!("invalid value for {}: {} ({})", key, v, e))),
        None => Ok(default),
    }
}

/// Age threshold for the stale-run sweep.
pub fn hours_to_duration(hours: u64) -> Result<Duration> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("stale run age of {} hours is out of range", hours)))
}

/// Split a comma separated id list, dropping blanks.
pub fn parse_id_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn normalize_server(server: &str) -> String {
    let trimmed = server.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// `costplan.db` next to the running executable, falling back to the
/// working directory.
fn default_db_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.join(DEFAULT_DB_FILE)))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("REMOTE_SERVER", "planner.example.com"),
        ("REMOTE_USERNAME", "operations"),
        ("REMOTE_PASSWORD", "hunter2"),
    ];

    #[test]
    fn test_defaults() {
        let s = Settings::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(s.remote.server, "https://planner.example.com");
        assert_eq!(s.remote.calls_per_second, 2.0);
        assert_eq!(s.remote.http_timeout, Duration::from_secs(30));
        assert_eq!(s.remote.max_retries, 3);
        assert_eq!(s.remote.retry_delay, Duration::from_secs(5));
        assert!(s.exclude_ids.is_empty());
        assert!(s.stale_run_after.is_none());
        assert!(s.db_path.ends_with(DEFAULT_DB_FILE));
    }

    #[test]
    fn test_password_required() {
        let err = Settings::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("REMOTE_PASSWORD"));
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("REMOTE_SERVER", "http://localhost:8080/"),
            ("CALLS_PER_SECOND", "0.5"),
            ("MAX_RETRIES", "5"),
            ("RETRY_DELAY_SECONDS", "1"),
            ("DB_PATH", "/tmp/results.db"),
            ("EXCLUDE_IDS", "mc-1, mc-2,,mc-3 "),
            ("STALE_RUN_HOURS", "12"),
        ]);
        let s = Settings::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(s.remote.server, "http://localhost:8080");
        assert_eq!(s.remote.calls_per_second, 0.5);
        assert_eq!(s.remote.max_retries, 5);
        assert_eq!(s.db_path, PathBuf::from("/tmp/results.db"));
        assert_eq!(s.exclude_ids.len(), 3);
        assert!(s.exclude_ids.contains("mc-3"));
        assert_eq!(s.stale_run_after, Some(Duration::from_secs(12 * 3600)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("CALLS_PER_SECOND", "0"),
            ("CALLS_PER_SECOND", "fast"),
            ("MAX_RETRIES", "0"),
            ("HTTP_TIMEOUT_SECONDS", "0"),
            ("STALE_RUN_HOURS", "-1"),
            ("STALE_RUN_HOURS", "18446744073709551615"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            assert!(
                Settings::from_lookup(lookup(&pairs)).is_err(),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }

    #[test]
    fn test_stale_hours_overflow() {
        assert_eq!(hours_to_duration(6).unwrap(), Duration::from_secs(21_600));
        let err = hours_to_duration(u64::MAX / 3600 + 1).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let s = Settings::from_lookup(lookup(&REQUIRED)).unwrap();
        let rendered = format!("{:?}", s);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
