//! Request routing between network and cache.
//!
//! - HTML navigations: network first, cached copy or offline page on failure.
//! - Other GETs: cache first, network on miss.
//! - Writes: network only. A failed `/api/` write registers a background sync.
//! - Cross-origin: passed through untouched.

use axum::http::Method;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache::{CacheError, CacheStorage};
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::fetch::{Fetcher, OriginRequest, OriginResponse};
use edurural_core::types::SyncIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    CrossOrigin,
    Navigation,
    Asset,
    Write,
    /// HEAD, OPTIONS and friends go straight to the network.
    Passthrough,
}

/// Outcome of pre-caching the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: usize,
    pub failed: Vec<String>,
}

pub struct CachingLayer {
    storage: Arc<CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    cache_name: String,
    offline_page: String,
    /// `host:port` of the origin.
    origin_authority: Option<String>,
    /// Authorities that name this proxy.
    own_authorities: Vec<String>,
    intents: mpsc::Sender<SyncIntent>,
}

impl CachingLayer {
    pub fn new(
        storage: Arc<CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
        config: &ShellConfig,
        intents: mpsc::Sender<SyncIntent>,
    ) -> Self {
        Self {
            storage,
            fetcher,
            cache_name: config.cache_name.clone(),
            offline_page: config.offline_page.clone(),
            origin_authority: authority_of(&config.origin_url),
            own_authorities: own_authorities(&config.host, config.port),
            intents,
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn classify(&self, request: &OriginRequest) -> RequestClass {
        if self.is_cross_origin(request) {
            return RequestClass::CrossOrigin;
        }
        match request.method {
            Method::GET if request.accepts_html() => RequestClass::Navigation,
            Method::GET => RequestClass::Asset,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE => RequestClass::Write,
            _ => RequestClass::Passthrough,
        }
    }

    /// A target is cross-origin only when its authority names neither this
    /// proxy nor the origin behind it.
    fn is_cross_origin(&self, request: &OriginRequest) -> bool {
        let Some(authority) = authority_of(&request.target) else {
            return false;
        };
        let addressed_to_proxy = request
            .host()
            .is_some_and(|host| host.eq_ignore_ascii_case(&authority))
            || self.own_authorities.contains(&authority);
        let addressed_to_origin = self.origin_authority.as_deref() == Some(authority.as_str());
        !(addressed_to_proxy || addressed_to_origin)
    }

    pub async fn handle(&self, mut request: OriginRequest) -> Result<OriginResponse, ShellError> {
        if !self.is_cross_origin(&request) {
            request.target = same_origin_key(&request.target);
        }
        let class = self.classify(&request);
        tracing::debug!(method = %request.method, target = %request.target, ?class, "shell request");

        match class {
            RequestClass::CrossOrigin | RequestClass::Passthrough => self
                .fetcher
                .fetch(request)
                .await
                .map_err(|e| ShellError::Upstream(e.to_string())),
            RequestClass::Navigation => self.network_first(request).await,
            RequestClass::Asset => self.cache_first(request).await,
            RequestClass::Write => self.network_only(request).await,
        }
    }

    async fn network_first(&self, request: OriginRequest) -> Result<OriginResponse, ShellError> {
        let key = request.target.clone();
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.status.is_success() {
                    self.store(&key, &response);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "network failed, trying cache");
                match self.lookup(&key) {
                    Some(hit) => Ok(hit),
                    None => self.offline_fallback(),
                }
            }
        }
    }

    async fn cache_first(&self, request: OriginRequest) -> Result<OriginResponse, ShellError> {
        let key = request.target.clone();
        if let Some(hit) = self.lookup(&key) {
            return Ok(hit);
        }
        match self.fetcher.fetch(request).await {
            Ok(response) => {
                if response.status.is_success() {
                    self.store(&key, &response);
                }
                Ok(response)
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "network failed, no cached copy");
                self.offline_fallback()
            }
        }
    }

    async fn network_only(&self, request: OriginRequest) -> Result<OriginResponse, ShellError> {
        let is_api = request.target.contains("/api/");
        let target = request.target.clone();
        match self.fetcher.fetch(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(%target, error = %e, "write failed while offline");
                if is_api {
                    self.register_background_sync();
                }
                Err(ShellError::Offline)
            }
        }
    }

    fn register_background_sync(&self) {
        let intent = SyncIntent::background();
        let tag = intent.tag.clone();
        match self.intents.try_send(intent) {
            Ok(()) => tracing::info!(%tag, "background sync registered"),
            // A full channel already holds a pending request.
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(%tag, "sync engine not listening, background sync dropped");
            }
        }
    }

    fn offline_fallback(&self) -> Result<OriginResponse, ShellError> {
        self.lookup(&self.offline_page).ok_or(ShellError::Unavailable)
    }

    fn lookup(&self, key: &str) -> Option<OriginResponse> {
        match self.storage.match_request(&self.cache_name, key) {
            Ok(hit) => hit.map(OriginResponse::from_cached),
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache read failed");
                None
            }
        }
    }

    /// Cache write failures never fail the response.
    fn store(&self, key: &str, response: &OriginResponse) {
        if let Err(e) = self
            .storage
            .put(&self.cache_name, key, &response.to_cached())
        {
            tracing::warn!(%key, error = %e, "cache write failed");
        }
    }

    /// Pre-cache `manifest`. Individual failures are logged and skipped.
    pub async fn install(&self, manifest: &[String]) -> InstallReport {
        let mut report = InstallReport::default();
        for path in manifest {
            let key = same_origin_key(path);
            let outcome = match self.fetcher.fetch(OriginRequest::get(key.clone())).await {
                Ok(response) if response.status.is_success() => self
                    .storage
                    .put(&self.cache_name, &key, &response.to_cached())
                    .map_err(|e| e.to_string()),
                Ok(response) => Err(format!("status {}", response.status)),
                Err(e) => Err(e.to_string()),
            };
            match outcome {
                Ok(()) => report.cached += 1,
                Err(reason) => {
                    tracing::warn!(%key, %reason, "could not pre-cache");
                    report.failed.push(key);
                }
            }
        }
        tracing::info!(
            cache = %self.cache_name,
            cached = report.cached,
            failed = report.failed.len(),
            "shell cache installed"
        );
        report
    }

    /// Delete every cache generation except the active one.
    pub fn activate(&self) -> Result<Vec<String>, CacheError> {
        let mut deleted = Vec::new();
        for name in self.storage.cache_names()? {
            if name != self.cache_name {
                self.storage.delete_cache(&name)?;
                tracing::info!(cache = %name, "deleted old cache");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }
}

/// `host[:port]` of an absolute URL, `None` for a path.
fn authority_of(target: &str) -> Option<String> {
    let rest = target
        .strip_prefix("http://")
        .or_else(|| target.strip_prefix("https://"))?;
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    Some(rest[..end].to_ascii_lowercase())
}

/// Names a client may use for a proxy bound to `host:port`.
///
/// The port is optional when it is the HTTP default, and loopback binds
/// answer to every loopback name.
fn own_authorities(host: &str, port: u16) -> Vec<String> {
    let host = host.to_ascii_lowercase();
    let mut hosts = vec![host.clone()];
    if matches!(host.as_str(), "localhost" | "127.0.0.1" | "[::1]" | "0.0.0.0" | "[::]") {
        for alias in ["localhost", "127.0.0.1", "[::1]"] {
            if alias != host {
                hosts.push(alias.to_string());
            }
        }
    }

    let mut authorities = Vec::new();
    for host in hosts {
        authorities.push(format!("{host}:{port}"));
        if port == 80 {
            authorities.push(host);
        }
    }
    authorities
}

/// Path and query of a same-origin target.
fn same_origin_key(target: &str) -> String {
    let path = match authority_of(target) {
        Some(authority) => {
            let scheme_len = if target.starts_with("https://") { 8 } else { 7 };
            &target[scheme_len + authority.len()..]
        }
        None => target,
    };
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}
