//! Talking to the origin that serves the app shell.

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use reqwest::Client;
use std::time::Duration;

use crate::cache::CachedResponse;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("origin unreachable: {0}")]
    Unreachable(String),

    #[error("origin timed out")]
    Timeout,

    #[error("invalid request: {0}")]
    Invalid(String),
}

/// A request on its way to the origin.
#[derive(Debug, Clone)]
pub struct OriginRequest {
    pub method: Method,
    /// Path and query for same-origin requests, a full URL otherwise.
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginRequest {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            target: target.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// `Host` header, lowercased.
    pub fn host(&self) -> Option<String> {
        self.headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_ascii_lowercase)
    }

    pub fn accepts_html(&self) -> bool {
        self.headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("text/html"))
    }
}

/// A response from the origin or from the cache.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OriginResponse {
    pub fn to_cached(&self) -> CachedResponse {
        CachedResponse {
            status: self.status.as_u16(),
            headers: self
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect(),
            body: self.body.to_vec(),
        }
    }

    pub fn from_cached(cached: CachedResponse) -> Self {
        let mut headers = HeaderMap::new();
        for (name, value) in &cached.headers {
            if let (Ok(name), Ok(value)) = (
                header::HeaderName::from_bytes(name.as_bytes()),
                header::HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }
        Self {
            status: StatusCode::from_u16(cached.status).unwrap_or(StatusCode::OK),
            headers,
            body: Bytes::from(cached.body),
        }
    }
}

/// Headers that describe one hop and must not be forwarded or replayed.
pub(crate) fn is_hop_by_hop(name: &header::HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "transfer-encoding"
            | "upgrade"
            | "te"
            | "trailer"
            | "host"
            | "content-length"
    )
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, FetchError>;
}

/// Forwards requests to the configured origin with reqwest.
pub struct HttpFetcher {
    client: Client,
    origin: String,
}

impl HttpFetcher {
    pub fn new(origin: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else {
            format!("{}{}", self.origin, target)
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, FetchError> {
        let mut headers = request.headers;
        headers.strip_hop_by_hop();

        let resp = self
            .client
            .request(request.method, self.url(&request.target))
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else if e.is_builder() {
                    FetchError::Invalid(e.to_string())
                } else {
                    FetchError::Unreachable(e.to_string())
                }
            })?;

        let status = resp.status();
        let mut headers = resp.headers().clone();
        headers.strip_hop_by_hop();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}

trait HeaderMapExt {
    fn strip_hop_by_hop(&mut self);
}

impl HeaderMapExt for HeaderMap {
    /// Remove hop-by-hop headers in place.
    fn strip_hop_by_hop(&mut self) {
        let names: Vec<_> = self
            .keys()
            .filter(|name| is_hop_by_hop(name))
            .cloned()
            .collect();
        for name in names {
            self.remove(name);
        }
    }
}
