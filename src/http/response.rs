//! Response view consumed at completion.
//!
//! # Responsibilities
//! - Expose status code, reason phrase and headers to finish hooks
//! - Provide the `Content-Type` lookup used by the response filter
//!
//! # Design Decisions
//! - Captured when the inner service hands back its response; the body
//!   streams afterwards and is recorded separately

use axum::http::response::Parts;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::request::flatten_headers;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditResponse {
    pub status_code: u16,
    pub status_message: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl AuditResponse {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            status_code: parts.status.as_u16(),
            status_message: parts.status.canonical_reason().map(str::to_string),
            headers: flatten_headers(&parts.headers),
        }
    }

    /// Header value by case-insensitive name.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}
