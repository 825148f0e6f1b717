//! Request body pre-parser.
//!
//! Buffers JSON, form and text bodies so the audit snapshot can carry a
//! parsed body. Other content types stream through untouched.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::{Map, Value};
use std::error::Error as StdError;

use crate::config::BodyConfig;

/// Request body as parsed before the audit session was created.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Text,
}

impl BodyKind {
    fn detect(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if mime == "application/json" || mime.ends_with("+json") {
            Some(BodyKind::Json)
        } else if mime == "application/x-www-form-urlencoded" {
            Some(BodyKind::Form)
        } else if mime.starts_with("text/") {
            Some(BodyKind::Text)
        } else {
            None
        }
    }

    /// Malformed JSON is kept as text rather than rejected.
    fn parse(self, bytes: &[u8]) -> Value {
        match self {
            BodyKind::Json => serde_json::from_slice(bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
            BodyKind::Form => Value::Object(
                url::form_urlencoded::parse(bytes)
                    .into_owned()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect::<Map<_, _>>(),
            ),
            BodyKind::Text => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

pub async fn parse_body_middleware(
    State(config): State<BodyConfig>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let kind = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(BodyKind::detect);

    let Some(kind) = kind else {
        return next.run(request).await;
    };

    let (mut parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, config.max_bytes).await {
        Ok(bytes) => bytes,
        Err(err) if exceeds_limit(&err) => {
            tracing::warn!(limit = config.max_bytes, "Request body over limit");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    if !bytes.is_empty() {
        parts.extensions.insert(ParsedBody(kind.parse(&bytes)));
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Whether buffering stopped at the configured limit rather than on a
/// transport error.
fn exceeds_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware::from_fn_with_state, routing::post, Router};
    use futures_util::stream;
    use serde_json::json;
    use tower::ServiceExt;

    fn router(max_bytes: usize) -> Router {
        Router::new()
            .route("/", post(|| async { "ok" }))
            .layer(from_fn_with_state(BodyConfig { max_bytes }, parse_body_middleware))
    }

    fn json_request(body: Body) -> Request<Body> {
        Request::post("/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap()
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let response = router(4)
            .oneshot(json_request(Body::from(r#"{"name":"Ada"}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_broken_body_stream_is_400() {
        let chunks = vec![Ok("{"), Err(std::io::Error::other("connection reset"))];
        let response = router(1024)
            .oneshot(json_request(Body::from_stream(stream::iter(chunks))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_body_within_limit_passes() {
        let response = router(1024)
            .oneshot(json_request(Body::from(r#"{"name":"Ada"}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_detect() {
        assert_eq!(BodyKind::detect("application/json"), Some(BodyKind::Json));
        assert_eq!(
            BodyKind::detect("application/merge-patch+json; charset=utf-8"),
            Some(BodyKind::Json)
        );
        assert_eq!(
            BodyKind::detect("application/x-www-form-urlencoded"),
            Some(BodyKind::Form)
        );
        assert_eq!(BodyKind::detect("text/plain"), Some(BodyKind::Text));
        assert_eq!(BodyKind::detect("application/octet-stream"), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!(BodyKind::Json.parse(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(BodyKind::Json.parse(b"{broken"), json!("{broken"));
        assert_eq!(
            BodyKind::Form.parse(b"name=Bob&role=admin"),
            json!({"name": "Bob", "role": "admin"})
        );
        assert_eq!(BodyKind::Text.parse(b"hello"), json!("hello"));
    }
}
