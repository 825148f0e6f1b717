//! Audit middleware.
//! Opens a session per request and wires body capture into the response.

use axum::{
    body::Body,
    extract::{rejection::RawPathParamsRejection, FromRequestParts, RawPathParams, State},
    http::{request::Parts, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::BTreeMap;

use crate::audit::{AuditSession, Auditor};
use crate::capture::InterceptedBody;
use crate::http::{AuditRequest, AuditResponse};

/// Must be installed with `Router::layer` so path parameters are resolved.
pub async fn audit_middleware(
    State(auditor): State<Auditor>,
    params: Result<RawPathParams, RawPathParamsRejection>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let params: BTreeMap<String, String> = params
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let (mut parts, body) = request.into_parts();
    let audit_request = AuditRequest::from_parts(&parts, params);
    let (session, completion) = auditor.create_audit_session(&audit_request);
    parts.extensions.insert(session.clone());

    let response = next.run(Request::from_parts(parts, body)).await;

    let Some(completion) = completion else {
        return response;
    };

    let (parts, body) = response.into_parts();
    let audit_response = AuditResponse::from_parts(&parts);
    tracing::trace!(
        method = %audit_request.method,
        url = %audit_request.url,
        status = audit_response.status_code,
        "Capturing response body"
    );

    let execution = session.execution().clone();
    let body = InterceptedBody::new(
        body,
        move |text| {
            execution.set_response_body(text);
        },
        move || completion.finish(&audit_response),
    );
    Response::from_parts(parts, Body::new(body))
}

/// Rejection when a handler asks for a session outside the audit middleware.
#[derive(Debug, Clone, Copy)]
pub struct AuditSessionMissing;

impl IntoResponse for AuditSessionMissing {
    fn into_response(self) -> Response {
        tracing::error!("AuditSession requested but audit middleware is not installed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Audit session unavailable").into_response()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuditSession {
    type Rejection = AuditSessionMissing;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuditSession>()
            .cloned()
            .ok_or(AuditSessionMissing)
    }
}
