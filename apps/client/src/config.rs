//! Client configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::sync::{RetryPolicy, SyncOptions};

const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;
const DATA_DIR_NAME: &str = "edurural-stem";
const DB_FILE_NAME: &str = "edurural.db";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    pub data_dir: PathBuf,
    pub sync_interval: Duration,
    pub remote_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            data_dir: default_data_dir(),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Read `EDURURAL_*` and `SYNC_*` variables. Call `dotenvy::dotenv()` first.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mut retry_policy = match parse_var::<u64>(&get, "SYNC_BACKOFF_BASE_SECS") {
            Some(secs) => RetryPolicy::with_backoff(
                Duration::from_secs(secs),
                defaults.retry_policy.max_backoff,
            ),
            None => RetryPolicy::default(),
        };
        if let Some(limit) = parse_var::<u32>(&get, "SYNC_DEAD_LETTER_AFTER") {
            retry_policy = retry_policy.dead_letter_after(limit);
        }

        Self {
            backend_url: get("EDURURAL_BACKEND_URL").unwrap_or(defaults.backend_url),
            data_dir: get("EDURURAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            sync_interval: parse_var(&get, "SYNC_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
            remote_timeout: parse_var(&get, "REMOTE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.remote_timeout),
            retry_policy,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            policy: self.retry_policy.clone(),
            remote_timeout: self.remote_timeout,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

/// Parse a numeric variable. Unparseable or zero values are ignored with a warning.
fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr + PartialEq + Default,
{
    let raw = get(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Some(value),
        _ => {
            tracing::warn!(key, value = %raw, "ignoring invalid value, using default");
            None
        }
    }
}
