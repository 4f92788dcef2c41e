//! Caching proxy in front of the app shell.
//!
//! Serves the shell pages and assets while the origin is unreachable and
//! asks the sync engine to flush the outbox when an API write fails.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod strategy;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, HeaderValue, Version},
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::sync::mpsc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::CacheStorage;
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::fetch::{is_hop_by_hop, HttpFetcher, OriginRequest, OriginResponse};
use crate::strategy::CachingLayer;
use edurural_core::types::SyncIntent;

/// Largest request body forwarded to the origin.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared proxy state
#[derive(Clone)]
pub struct ShellState {
    pub layer: Arc<CachingLayer>,
}

pub fn router(state: ShellState) -> Router {
    Router::new()
        .route("/_shell/health", get(health))
        .fallback(proxy)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health(State(state): State<ShellState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "cache": state.layer.cache_name(),
    }))
}

async fn proxy(State(state): State<ShellState>, request: Request) -> Result<Response, ShellError> {
    let request = origin_request(request).await?;
    let response = state.layer.handle(request).await?;
    Ok(into_response(response))
}

async fn origin_request(request: Request) -> Result<OriginRequest, ShellError> {
    let (mut parts, body) = request.into_parts();
    // HTTP/2 carries the host as `:authority`, which hyper puts in the URI.
    if parts.version == Version::HTTP_2 && !parts.headers.contains_key(header::HOST) {
        if let Some(value) = parts
            .uri
            .authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        {
            parts.headers.insert(header::HOST, value);
        }
    }
    // Keep the authority; the caching layer decides whether it names us.
    let target = if parts.uri.authority().is_some() {
        parts.uri.to_string()
    } else {
        parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string())
    };
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ShellError::BadRequest(e.to_string()))?;

    Ok(OriginRequest {
        method: parts.method,
        target,
        headers: parts.headers,
        body,
    })
}

fn into_response(origin: OriginResponse) -> Response {
    let mut response = Response::new(Body::from(origin.body));
    *response.status_mut() = origin.status;
    let headers = response.headers_mut();
    for (name, value) in origin.headers.iter() {
        if !is_hop_by_hop(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    response
}

/// Open the cache, install the precache manifest, drop stale generations,
/// and serve until the listener fails.
pub async fn serve(config: ShellConfig, intents: mpsc::Sender<SyncIntent>) -> anyhow::Result<()> {
    let storage = match &config.cache_db {
        Some(path) => match CacheStorage::open(path) {
            Ok(storage) => storage,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "shell cache unavailable, using memory");
                CacheStorage::open_in_memory()?
            }
        },
        None => CacheStorage::open_in_memory()?,
    };

    let fetcher = HttpFetcher::new(&config.origin_url, config.fetch_timeout);
    let layer = CachingLayer::new(Arc::new(storage), Arc::new(fetcher), &config, intents);

    layer.install(&config.precache).await;
    layer.activate()?;

    let app = router(ShellState {
        layer: Arc::new(layer),
    });

    let addr = config.bind_addr();
    tracing::info!("Shell proxy listening on {} (origin {})", addr, config.origin_url);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Run the proxy on its own, without a sync engine attached.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (tx, mut rx) = mpsc::channel::<SyncIntent>(32);
    tokio::spawn(async move {
        while let Some(intent) = rx.recv().await {
            tracing::info!(tag = %intent.tag, "background sync requested, no engine attached");
        }
    });

    serve(ShellConfig::from_env(), tx).await
}
