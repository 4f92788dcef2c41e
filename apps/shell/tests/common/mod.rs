//! Shared fixtures for shell proxy tests.
//!
//! - `FakeOrigin` stands in for the web server and can be switched offline.
//! - `TestShell` wires it to an in-memory cache behind the real router.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum_test::TestServer;
use tokio::sync::mpsc;

use edurural_core::types::SyncIntent;
use edurural_shell::cache::CacheStorage;
use edurural_shell::config::ShellConfig;
use edurural_shell::fetch::{FetchError, Fetcher, OriginRequest, OriginResponse};
use edurural_shell::strategy::CachingLayer;
use edurural_shell::{router, ShellState};

pub const ORIGIN: &str = "http://localhost:8000";

/// In-process origin. Unknown paths answer 404.
pub struct FakeOrigin {
    pages: Mutex<HashMap<String, (String, String)>>,
    online: AtomicBool,
    log: Mutex<Vec<(Method, String)>>,
}

impl FakeOrigin {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            online: AtomicBool::new(true),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn page(self, path: &str, content_type: &str, body: &str) -> Self {
        self.set_page(path, content_type, body);
        self
    }

    pub fn set_page(&self, path: &str, content_type: &str, body: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(path.to_string(), (content_type.to_string(), body.to_string()));
    }

    pub fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }

    pub fn go_online(&self) {
        self.online.store(true, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<(Method, String)> {
        self.log.lock().unwrap().clone()
    }

    pub fn hits(&self, target: &str) -> usize {
        self.requests().iter().filter(|(_, t)| t == target).count()
    }
}

#[async_trait]
impl Fetcher for FakeOrigin {
    async fn fetch(&self, request: OriginRequest) -> Result<OriginResponse, FetchError> {
        self.log
            .lock()
            .unwrap()
            .push((request.method.clone(), request.target.clone()));

        if !self.online.load(Ordering::SeqCst) {
            return Err(FetchError::Unreachable("connection refused".into()));
        }

        if request.method != Method::GET {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            return Ok(OriginResponse {
                status: StatusCode::CREATED,
                headers,
                body: Bytes::from_static(br#"{"ok":true}"#),
            });
        }

        let path = request.target.split('?').next().unwrap_or_default().to_string();
        let page = self.pages.lock().unwrap().get(&path).cloned();
        Ok(match page {
            Some((content_type, body)) => {
                let mut headers = HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, content_type.parse().unwrap());
                OriginResponse {
                    status: StatusCode::OK,
                    headers,
                    body: Bytes::from(body),
                }
            }
            None => OriginResponse {
                status: StatusCode::NOT_FOUND,
                headers: HeaderMap::new(),
                body: Bytes::from_static(b"not found"),
            },
        })
    }
}

/// The shell router over a fake origin.
pub struct TestShell {
    pub server: TestServer,
    pub origin: Arc<FakeOrigin>,
    pub layer: Arc<CachingLayer>,
    pub storage: Arc<CacheStorage>,
    pub intents: mpsc::Receiver<SyncIntent>,
}

impl TestShell {
    pub fn new(origin: FakeOrigin) -> Self {
        Self::with_storage(origin, Arc::new(CacheStorage::open_in_memory().unwrap()))
    }

    pub fn with_storage(origin: FakeOrigin, storage: Arc<CacheStorage>) -> Self {
        // axum-test addresses requests to `http://localhost`.
        let config = ShellConfig {
            origin_url: ORIGIN.to_string(),
            host: "localhost".to_string(),
            port: 80,
            ..ShellConfig::default()
        };
        let origin = Arc::new(origin);
        let (tx, intents) = mpsc::channel(8);
        let layer = Arc::new(CachingLayer::new(
            storage.clone(),
            origin.clone(),
            &config,
            tx,
        ));
        let server = TestServer::new(router(ShellState {
            layer: layer.clone(),
        }))
        .unwrap();

        Self {
            server,
            origin,
            layer,
            storage,
            intents,
        }
    }
}

/// Origin serving a minimal app shell.
pub fn shell_origin() -> FakeOrigin {
    FakeOrigin::new()
        .page("/pages/student.html", "text/html", "<h1>Student</h1>")
        .page("/pages/quiz.html", "text/html", "<h1>Quiz</h1>")
        .page("/pages/offline.html", "text/html", "<h1>Offline</h1>")
        .page("/css/styles.css", "text/css", "body{}")
        .page("/js/sync.js", "application/javascript", "// sync")
}

pub fn html() -> (header::HeaderName, HeaderValue) {
    (
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml"),
    )
}
