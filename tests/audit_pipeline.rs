//! End-to-end tests through the layered router.

mod common;

use axum::{
    body::Body,
    http::{header, Request},
    routing::get,
    Router,
};
use futures_util::stream;
use serde_json::json;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use common::{custom_router, demo_router, recording_auditor, send};
use request_auditor::{AuditSession, AuditorOptions, RequestFilter, ResponseFilter};

fn put_user(id: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(format!("/users/{id}?source=admin"))
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-user", "ada")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_update_emits_full_record() {
    let (auditor, recorder) = recording_auditor(AuditorOptions::new());
    let router = demo_router(auditor);

    let (status, body) = send(router, put_user("42", json!({"name": "Ada"}))).await;
    assert_eq!(status, 200);

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];

    let metadata = &record["metadata"];
    assert_eq!(metadata["user"], "ada");
    assert_eq!(metadata["type"], "user.update");
    assert_eq!(metadata["objects"], json!(["user:42"]));
    assert_eq!(
        metadata["changes"],
        json!([{"property": "name", "from": null, "to": "Ada"}])
    );

    let execution = &record["execution"];
    assert_eq!(execution["request"]["method"], "PUT");
    assert_eq!(execution["request"]["url"], "/users/42?source=admin");
    assert_eq!(execution["request"]["params"], json!({"id": "42"}));
    assert_eq!(execution["request"]["query"], json!({"source": "admin"}));
    assert_eq!(execution["request"]["body"], json!({"name": "Ada"}));
    assert_eq!(execution["request"]["headers"]["x-user"], "ada");
    assert_eq!(execution["response"]["statusCode"], 200);
    assert_eq!(execution["response"]["body"], body);
    assert!(execution["response"]["headers"]["content-type"]
        .as_str()
        .unwrap()
        .starts_with("application/json"));
    assert!(execution["finishedAt"].as_i64().unwrap() >= execution["startAt"].as_i64().unwrap());
}

#[tokio::test]
async fn test_unchanged_fields_record_no_change() {
    let (auditor, recorder) = recording_auditor(AuditorOptions::new());
    let router = demo_router(auditor);

    send(router.clone(), put_user("7", json!({"role": "admin"}))).await;
    send(router, put_user("7", json!({"role": "admin"}))).await;

    let records = recorder.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["metadata"]["changes"].as_array().unwrap().len(), 1);
    assert_eq!(records[1]["metadata"]["changes"], json!([]));
}

#[tokio::test]
async fn test_request_filter_skips_emission() {
    let options = AuditorOptions::new().with_request_filter(RequestFilter::methods(["PUT"]));
    let (auditor, recorder) = recording_auditor(options);
    let router = demo_router(auditor);

    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = send(router.clone(), request).await;
    assert_eq!((status, body.as_str()), (200, "ok"));
    assert!(recorder.records().is_empty());

    send(router, put_user("1", json!({"name": "Bob"}))).await;
    assert_eq!(recorder.records().len(), 1);
}

#[tokio::test]
async fn test_excluded_request_still_gets_session() {
    let options = AuditorOptions::new().with_request_filter(RequestFilter::methods(["DELETE"]));
    let (auditor, recorder) = recording_auditor(options);
    let seen: Arc<Mutex<Option<AuditSession>>> = Arc::default();

    let slot = seen.clone();
    let routes = Router::new().route(
        "/ping",
        get(move |session: AuditSession| {
            let slot = slot.clone();
            async move {
                session.metadata().set_type("ping");
                *slot.lock().unwrap() = Some(session);
                "pong"
            }
        }),
    );

    let request = Request::get("/ping").body(Body::empty()).unwrap();
    let (status, _) = send(custom_router(auditor, routes), request).await;
    assert_eq!(status, 200);
    assert!(recorder.records().is_empty());

    let session = seen.lock().unwrap().take().unwrap();
    let store = session.get_store();
    assert_eq!(store.metadata().kind.as_deref(), Some("ping"));
    assert!(store.execution().finished_at.is_none());
    assert!(store.execution().response.body.is_none());
}

#[tokio::test]
async fn test_response_filter_runs_hooks_without_emitting() {
    let options =
        AuditorOptions::new().with_response_filter(ResponseFilter::content_types(["text/csv"]));
    let (auditor, recorder) = recording_auditor(options);
    let seen: Arc<Mutex<Option<AuditSession>>> = Arc::default();

    let slot = seen.clone();
    let routes = Router::new().route(
        "/report",
        get(move |session: AuditSession| {
            let slot = slot.clone();
            async move {
                *slot.lock().unwrap() = Some(session);
                "plain text"
            }
        }),
    );

    let request = Request::get("/report").body(Body::empty()).unwrap();
    send(custom_router(auditor, routes), request).await;
    assert!(recorder.records().is_empty());

    let session = seen.lock().unwrap().take().unwrap();
    let execution = session.get_store().execution();
    assert!(execution.finished_at.is_some());
    assert_eq!(execution.response.status_code, Some(200));
    assert_eq!(execution.response.body.as_deref(), Some("plain text"));
}

#[tokio::test]
async fn test_streamed_body_is_concatenated() {
    let (auditor, recorder) = recording_auditor(AuditorOptions::new());
    let routes = Router::new().route(
        "/stream",
        get(|| async {
            let chunks = ["ab", "cd", "ef"].map(Ok::<_, Infallible>);
            Body::from_stream(stream::iter(chunks))
        }),
    );

    let request = Request::get("/stream").body(Body::empty()).unwrap();
    let (_, body) = send(custom_router(auditor, routes), request).await;
    assert_eq!(body, "abcdef");

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["execution"]["response"]["body"], "abcdef");
}

#[tokio::test]
async fn test_reported_exception_is_parsed() {
    let (auditor, recorder) = recording_auditor(AuditorOptions::new());
    let router = demo_router(auditor);

    let report = json!({
        "name": "TypeError",
        "message": "boom",
        "stack": "TypeError: boom\n    at /srv/app/index.js:10:5\n    at Array.forEach (native)",
    });
    let request = Request::post("/errors")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(report.to_string()))
        .unwrap();

    let (status, _) = send(router, request).await;
    assert_eq!(status, 202);

    let records = recorder.records();
    let exception = &records[0]["execution"]["exception"];
    assert_eq!(exception["name"], "TypeError");
    assert_eq!(exception["message"], "boom");
    assert!(exception["launchedAt"].is_string());

    let frames = exception["stack"].as_array().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["fileName"], "/srv/app/index.js");
    assert_eq!(frames[0]["lineNumber"], 10);
    assert_eq!(frames[0]["columnNumber"], 5);
    assert_eq!(frames[1]["native"], true);
    assert_eq!(records[0]["metadata"]["type"], "client.error");
}

#[tokio::test]
async fn test_unsubscribed_callback_is_not_invoked() {
    let (auditor, recorder) = recording_auditor(AuditorOptions::new());
    let extra: Arc<Mutex<usize>> = Arc::default();
    let counter = extra.clone();
    let id = auditor.on_finish(move |_| *counter.lock().unwrap() += 1);

    let router = demo_router(auditor.clone());
    let request = || Request::get("/health").body(Body::empty()).unwrap();

    send(router.clone(), request()).await;
    assert!(auditor.off_finish(id));
    send(router, request()).await;

    assert_eq!(*extra.lock().unwrap(), 1);
    assert_eq!(recorder.records().len(), 2);
}

#[tokio::test]
async fn test_request_dropped_mid_handler_still_finishes() {
    let (auditor, recorder) = recording_auditor(AuditorOptions::new());
    let seen: Arc<Mutex<Option<AuditSession>>> = Arc::default();

    let slot = seen.clone();
    let routes = Router::new().route(
        "/slow",
        get(move |session: AuditSession| {
            let slot = slot.clone();
            async move {
                *slot.lock().unwrap() = Some(session);
                tokio::time::sleep(Duration::from_secs(60)).await;
                "too late"
            }
        }),
    );

    let request = Request::get("/slow").body(Body::empty()).unwrap();
    let pending = custom_router(auditor, routes).oneshot(request);
    assert!(tokio::time::timeout(Duration::from_millis(50), pending)
        .await
        .is_err());

    let session = seen.lock().unwrap().take().unwrap();
    let execution = session.get_store().execution();
    assert!(execution.finished_at.is_some());
    assert_eq!(execution.response.status_code, Some(0));
    assert!(execution.response.body.is_none());

    let records = recorder.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["execution"]["request"]["url"], "/slow");
}
