//! Shell proxy behavior with the origin up and down.

mod common;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use edurural_core::types::BACKGROUND_SYNC_TAG;
use edurural_shell::cache::{CacheStorage, CachedResponse};
use edurural_shell::fetch::OriginRequest;
use edurural_shell::strategy::RequestClass;
use tokio_test::assert_ok;

use common::{html, shell_origin, FakeOrigin, TestShell};

#[tokio::test]
async fn visited_page_is_served_offline() {
    let shell = TestShell::new(shell_origin());
    let (name, value) = html();

    let online = shell
        .server
        .get("/pages/student.html")
        .add_header(name.clone(), value.clone())
        .await;
    online.assert_status_ok();
    assert_eq!(online.text(), "<h1>Student</h1>");

    shell.origin.go_offline();
    let offline = shell
        .server
        .get("/pages/student.html")
        .add_header(name, value)
        .await;
    offline.assert_status_ok();
    assert_eq!(offline.text(), "<h1>Student</h1>");
    assert_eq!(offline.header(header::CONTENT_TYPE), "text/html");
}

#[tokio::test]
async fn navigation_prefers_the_network_when_online() {
    let shell = TestShell::new(shell_origin());
    let (name, value) = html();

    shell
        .server
        .get("/pages/quiz.html")
        .add_header(name.clone(), value.clone())
        .await;
    shell
        .origin
        .set_page("/pages/quiz.html", "text/html", "<h1>Quiz v2</h1>");

    let response = shell
        .server
        .get("/pages/quiz.html")
        .add_header(name, value)
        .await;
    assert_eq!(response.text(), "<h1>Quiz v2</h1>");
    assert_eq!(shell.origin.hits("/pages/quiz.html"), 2);
}

#[tokio::test]
async fn unvisited_page_offline_gets_offline_page() {
    let shell = TestShell::new(shell_origin());
    shell.layer.install(&["/pages/offline.html".to_string()]).await;
    shell.origin.go_offline();
    let (name, value) = html();

    let response = shell
        .server
        .get("/pages/teacher.html")
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "<h1>Offline</h1>");
}

#[tokio::test]
async fn no_offline_page_means_service_unavailable() {
    let shell = TestShell::new(shell_origin());
    shell.origin.go_offline();
    let (name, value) = html();

    let response = shell
        .server
        .get("/pages/teacher.html")
        .add_header(name, value)
        .await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn assets_are_cache_first() {
    let shell = TestShell::new(shell_origin());

    shell.server.get("/css/styles.css").await.assert_status_ok();
    shell.origin.set_page("/css/styles.css", "text/css", "body{color:red}");

    let response = shell.server.get("/css/styles.css").await;
    assert_eq!(response.text(), "body{}");
    assert_eq!(shell.origin.hits("/css/styles.css"), 1);
}

#[tokio::test]
async fn error_responses_are_not_cached() {
    let shell = TestShell::new(shell_origin());

    shell
        .server
        .get("/js/missing.js")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert!(shell
        .storage
        .match_request(shell.layer.cache_name(), "/js/missing.js")
        .unwrap()
        .is_none());

    shell
        .origin
        .set_page("/js/missing.js", "application/javascript", "// here now");
    let response = shell.server.get("/js/missing.js").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "// here now");
}

#[tokio::test]
async fn failed_api_write_returns_offline_and_registers_sync() {
    let mut shell = TestShell::new(shell_origin());
    shell.origin.go_offline();

    let response = shell
        .server
        .post("/api/quiz-results")
        .json(&serde_json::json!({ "studentId": "s1", "lessonId": "math_1", "score": 80 }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json();
    assert_eq!(body, serde_json::json!({ "error": "Offline" }));

    let intent = shell.intents.try_recv().unwrap();
    assert_eq!(intent.tag, BACKGROUND_SYNC_TAG);
}

#[tokio::test]
async fn failed_non_api_write_does_not_register_sync() {
    let mut shell = TestShell::new(shell_origin());
    shell.origin.go_offline();

    let response = shell.server.post("/contact").text("hello").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert!(shell.intents.try_recv().is_err());
}

#[tokio::test]
async fn writes_pass_through_when_online() {
    let mut shell = TestShell::new(shell_origin());

    let response = shell
        .server
        .post("/api/quiz-results")
        .json(&serde_json::json!({ "score": 80 }))
        .await;

    response.assert_status(StatusCode::CREATED);
    assert!(shell.intents.try_recv().is_err());
    assert_eq!(
        shell.origin.requests(),
        vec![(Method::POST, "/api/quiz-results".to_string())]
    );
}

#[tokio::test]
async fn install_tolerates_missing_paths() {
    let shell = TestShell::new(shell_origin());

    let report = shell
        .layer
        .install(&[
            "/pages/student.html".to_string(),
            "/js/firebase.js".to_string(),
            "/css/styles.css".to_string(),
        ])
        .await;

    assert_eq!(report.cached, 2);
    assert_eq!(report.failed, vec!["/js/firebase.js".to_string()]);
}

#[tokio::test]
async fn install_with_origin_down_caches_nothing() {
    let shell = TestShell::new(shell_origin());
    shell.origin.go_offline();

    let report = shell.layer.install(&["/".to_string()]).await;
    assert_eq!(report.cached, 0);
    assert_eq!(report.failed.len(), 1);
}

#[tokio::test]
async fn activate_deletes_other_generations() {
    let storage = Arc::new(CacheStorage::open_in_memory().unwrap());
    let stale = CachedResponse {
        status: 200,
        headers: vec![("content-type".into(), "text/html".into())],
        body: b"<h1>old</h1>".to_vec(),
    };
    storage.put("edurural-v0", "/index.html", &stale).unwrap();

    let shell = TestShell::with_storage(shell_origin(), storage.clone());
    shell.layer.install(&["/pages/quiz.html".to_string()]).await;

    let deleted = shell.layer.activate().unwrap();
    assert_eq!(deleted, vec!["edurural-v0".to_string()]);
    assert_eq!(storage.cache_names().unwrap(), vec!["edurural-v1".to_string()]);
}

#[tokio::test]
async fn cross_origin_requests_bypass_the_cache() {
    let origin = FakeOrigin::new();
    let shell = TestShell::new(origin);
    let request = OriginRequest::get("https://cdn.example.org/lib.js");
    assert_eq!(shell.layer.classify(&request), RequestClass::CrossOrigin);

    assert_ok!(shell.layer.handle(request).await);
    assert!(shell.storage.cache_names().unwrap().is_empty());
    assert_eq!(
        shell.origin.requests(),
        vec![(Method::GET, "https://cdn.example.org/lib.js".to_string())]
    );
}

#[tokio::test]
async fn same_origin_absolute_urls_share_cache_keys() {
    let shell = TestShell::new(shell_origin());

    assert_ok!(
        shell
            .layer
            .handle(OriginRequest::get("http://localhost:8000/css/styles.css"))
            .await
    );
    shell.origin.go_offline();

    let response = shell.server.get("/css/styles.css").await;
    response.assert_status_ok();
    assert_eq!(response.text(), "body{}");
}

#[tokio::test]
async fn health_reports_active_cache() {
    let shell = TestShell::new(FakeOrigin::new());

    let response = shell.server.get("/_shell/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["cache"], "edurural-v1");
    assert!(shell.origin.requests().is_empty());
}

#[tokio::test]
async fn absolute_urls_naming_the_proxy_use_the_cache() {
    let shell = TestShell::new(shell_origin());
    shell.server.get("/css/styles.css").await.assert_status_ok();
    shell.origin.go_offline();

    for target in [
        "http://localhost/css/styles.css",
        "http://127.0.0.1/css/styles.css",
        "http://localhost:80/css/styles.css",
    ] {
        let request = OriginRequest::get(target);
        assert_eq!(shell.layer.classify(&request), RequestClass::Asset, "{target}");
        let response = shell.layer.handle(request).await.unwrap();
        assert_eq!(response.body, "body{}");
    }
    assert_eq!(
        shell.origin.requests(),
        vec![(Method::GET, "/css/styles.css".to_string())]
    );
}

#[tokio::test]
async fn host_header_marks_the_authority_as_ours() {
    let shell = TestShell::new(shell_origin());

    let mut request = OriginRequest::get("http://shell.school.lan:8443/pages/student.html");
    request
        .headers
        .insert(header::HOST, HeaderValue::from_static("shell.school.lan:8443"));
    request
        .headers
        .insert(header::ACCEPT, HeaderValue::from_static("text/html"));
    assert_eq!(shell.layer.classify(&request), RequestClass::Navigation);

    assert_ok!(shell.layer.handle(request).await);
    assert!(shell
        .storage
        .match_request(shell.layer.cache_name(), "/pages/student.html")
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn foreign_host_with_our_host_header_is_still_cross_origin() {
    let shell = TestShell::new(FakeOrigin::new());

    let mut request = OriginRequest::get("https://cdn.example.org/lib.js");
    request
        .headers
        .insert(header::HOST, HeaderValue::from_static("localhost"));
    assert_eq!(shell.layer.classify(&request), RequestClass::CrossOrigin);
}

#[tokio::test]
async fn student_page_survives_network_failure() {
    let shell = TestShell::new(shell_origin());
    let (name, value) = html();

    shell
        .server
        .get("/pages/student.html")
        .add_header(name.clone(), value.clone())
        .await
        .assert_status_ok();
    assert_eq!(
        shell.origin.requests(),
        vec![(Method::GET, "/pages/student.html".to_string())]
    );
    shell
        .origin
        .set_page("/pages/student.html", "text/html", "<h1>changed</h1>");
    shell.origin.go_offline();

    let response = shell
        .server
        .get("/pages/student.html")
        .add_header(name, value)
        .await;
    response.assert_status_ok();
    assert_eq!(response.text(), "<h1>Student</h1>");
}
