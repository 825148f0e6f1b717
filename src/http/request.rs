//! Request view consumed by the auditor.
//!
//! # Responsibilities
//! - Snapshot the request fields an audit record needs
//! - Decode query string pairs, flatten headers
//! - Carry the pre-parsed body left by the body parser, if any
//!
//! # Design Decisions
//! - Built once per request; the snapshot never changes afterwards
//! - Header names are lower-case, repeated values joined with `, `
//! - The body is never parsed here; absent upstream parsing it is `null`

use axum::extract::ConnectInfo;
use axum::http::{request::Parts, HeaderMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::http::middleware::ParsedBody;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub body: Value,
    pub method: String,
    /// Path and query, as received.
    pub url: String,
    pub protocol: String,
    pub params: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub ip: Option<String>,
}

impl AuditRequest {
    /// Snapshot request parts. `params` are the matched path parameters.
    pub fn from_parts(parts: &Parts, params: BTreeMap<String, String>) -> Self {
        let query = parts
            .uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        Self {
            body: parts
                .extensions
                .get::<ParsedBody>()
                .map(|parsed| parsed.0.clone())
                .unwrap_or(Value::Null),
            method: parts.method.to_string(),
            url: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
            protocol: protocol(parts),
            params,
            query,
            headers: flatten_headers(&parts.headers),
            ip: parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string()),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Scheme of an absolute-form URI, else the first `X-Forwarded-Proto` hop,
/// else `http`. Origin-form requests carry no scheme of their own.
fn protocol(parts: &Parts) -> String {
    if let Some(scheme) = parts.uri.scheme_str() {
        return scheme.to_string();
    }
    parts
        .headers
        .get(X_FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|proto| proto.trim().to_ascii_lowercase())
        .filter(|proto| !proto.is_empty())
        .unwrap_or_else(|| "http".to_string())
}

pub(crate) fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match flat.entry(name.as_str().to_string()) {
            Entry::Occupied(mut entry) => {
                let existing = entry.get_mut();
                existing.push_str(", ");
                existing.push_str(&value);
            }
            Entry::Vacant(entry) => {
                entry.insert(value.into_owned());
            }
        }
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    #[test]
    fn test_snapshot_from_parts() {
        let mut request = Request::builder()
            .method("PATCH")
            .uri("/users/7?fields=name&fields=email&dry%20run=yes")
            .header("X-Actor", "alice")
            .header("accept", "text/html")
            .header("accept", "application/json")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ParsedBody(json!({"name": "Bob"})));
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 4000))));
        let (parts, ()) = request.into_parts();

        let params = BTreeMap::from([("id".to_string(), "7".to_string())]);
        let snapshot = AuditRequest::from_parts(&parts, params);

        assert_eq!(snapshot.method, "PATCH");
        assert_eq!(snapshot.url, "/users/7?fields=name&fields=email&dry%20run=yes");
        assert_eq!(snapshot.protocol, "http");
        assert_eq!(snapshot.params["id"], "7");
        assert_eq!(snapshot.query["fields"], "email");
        assert_eq!(snapshot.query["dry run"], "yes");
        assert_eq!(snapshot.header("x-actor"), Some("alice"));
        assert_eq!(snapshot.headers["accept"], "text/html, application/json");
        assert_eq!(snapshot.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(snapshot.body, json!({"name": "Bob"}));
    }

    #[test]
    fn test_missing_extensions() {
        let (parts, ()) = Request::builder()
            .uri("https://example.com/")
            .body(())
            .unwrap()
            .into_parts();
        let snapshot = AuditRequest::from_parts(&parts, BTreeMap::new());

        assert_eq!(snapshot.protocol, "https");
        assert_eq!(snapshot.body, Value::Null);
        assert!(snapshot.ip.is_none());
        assert!(snapshot.query.is_empty());
    }

    #[test]
    fn test_protocol_from_forwarded_header() {
        let (parts, ()) = Request::builder()
            .uri("/users/7")
            .header("X-Forwarded-Proto", "HTTPS, http")
            .body(())
            .unwrap()
            .into_parts();
        let snapshot = AuditRequest::from_parts(&parts, BTreeMap::new());

        assert_eq!(snapshot.protocol, "https");
    }
}
