//! Shell proxy configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_CACHE_NAME: &str = "edurural-v1";
pub const DEFAULT_OFFLINE_PAGE: &str = "/pages/offline.html";

/// Pages, styles, scripts, and manifest the app needs to boot offline.
pub const DEFAULT_PRECACHE: &[&str] = &[
    "/",
    "/index.html",
    "/pages/student.html",
    "/pages/lesson.html",
    "/pages/quiz.html",
    "/pages/teacher.html",
    "/pages/offline.html",
    "/css/styles.css",
    "/js/auth.js",
    "/js/firebase.js",
    "/js/router.js",
    "/js/indexedDB.js",
    "/js/sync.js",
    "/js/i18n.js",
    "/js/ui.js",
    "/manifest.json",
];

#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Where the app shell is served from.
    pub origin_url: String,
    pub host: String,
    pub port: u16,
    /// Active cache generation. Every other generation is dropped on activate.
    pub cache_name: String,
    pub offline_page: String,
    pub precache: Vec<String>,
    /// SQLite file backing the cache. `None` keeps it in memory.
    pub cache_db: Option<PathBuf>,
    pub fetch_timeout: Duration,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            origin_url: "http://localhost:8000".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8080,
            cache_name: DEFAULT_CACHE_NAME.to_string(),
            offline_page: DEFAULT_OFFLINE_PAGE.to_string(),
            precache: DEFAULT_PRECACHE.iter().map(|p| p.to_string()).collect(),
            cache_db: None,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ShellConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            origin_url: get("SHELL_ORIGIN_URL").unwrap_or(defaults.origin_url),
            host: get("SHELL_HOST").unwrap_or(defaults.host),
            port: parse_var(&get, "SHELL_PORT").unwrap_or(defaults.port),
            cache_name: get("SHELL_CACHE_NAME")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.cache_name),
            offline_page: get("SHELL_OFFLINE_PAGE").unwrap_or(defaults.offline_page),
            precache: get("SHELL_PRECACHE")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.precache),
            cache_db: get("SHELL_CACHE_DB").map(PathBuf::from),
            fetch_timeout: parse_var(&get, "SHELL_FETCH_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

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
