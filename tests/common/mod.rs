//! Shared utilities for integration tests.

use axum::{body::Body, http::Request, Router};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use request_auditor::{config::AuditConfig, Auditor, AuditorOptions, HttpServer};

/// Records every emitted audit record as JSON.
#[derive(Clone, Default)]
pub struct Recorder {
    records: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    pub fn records(&self) -> Vec<Value> {
        self.records.lock().unwrap().clone()
    }
}

/// Build an auditor with a recording subscriber attached.
pub fn recording_auditor(options: AuditorOptions) -> (Auditor, Recorder) {
    let auditor = Auditor::new(options).unwrap();
    let recorder = Recorder::default();
    let sink = recorder.records.clone();
    auditor.on_finish(move |store| sink.lock().unwrap().push(store.to_json()));
    (auditor, recorder)
}

/// Fully layered demo server router.
pub fn demo_router(auditor: Auditor) -> Router {
    HttpServer::new(AuditConfig::default(), auditor).router()
}

/// Fully layered router around caller-supplied routes.
#[allow(dead_code)]
pub fn custom_router(auditor: Auditor, routes: Router) -> Router {
    HttpServer::with_routes(AuditConfig::default(), auditor, routes).router()
}

/// Drive one request and read the whole response body, which is what
/// completes the audit.
pub async fn send(router: Router, request: Request<Body>) -> (u16, String) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
