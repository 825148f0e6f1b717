//! Request and response filters.
//!
//! # Design Decisions
//! - Method allow-lists compare case-insensitively
//! - Content-type allow-lists compare the raw `Content-Type` value exactly,
//!   without MIME parsing (`application/json; charset=utf-8` is not
//!   `application/json`)
//! - No filter configured = everything passes

use std::fmt;
use std::sync::Arc;

use crate::http::{AuditRequest, AuditResponse};

pub type RequestPredicate = Arc<dyn Fn(&AuditRequest) -> bool + Send + Sync>;
pub type ResponsePredicate = Arc<dyn Fn(&AuditResponse) -> bool + Send + Sync>;

/// Decides whether a request is audited at all.
#[derive(Clone)]
pub enum RequestFilter {
    Predicate(RequestPredicate),
    Methods(Vec<String>),
}

impl RequestFilter {
    pub fn predicate(f: impl Fn(&AuditRequest) -> bool + Send + Sync + 'static) -> Self {
        RequestFilter::Predicate(Arc::new(f))
    }

    pub fn methods<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RequestFilter::Methods(methods.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, request: &AuditRequest) -> bool {
        match self {
            RequestFilter::Predicate(f) => f(request),
            RequestFilter::Methods(methods) => methods
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&request.method)),
        }
    }
}

impl fmt::Debug for RequestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestFilter::Predicate(_) => f.write_str("Predicate(..)"),
            RequestFilter::Methods(methods) => f.debug_tuple("Methods").field(methods).finish(),
        }
    }
}

/// Decides whether a completed record is emitted.
#[derive(Clone)]
pub enum ResponseFilter {
    Predicate(ResponsePredicate),
    ContentTypes(Vec<String>),
}

impl ResponseFilter {
    pub fn predicate(f: impl Fn(&AuditResponse) -> bool + Send + Sync + 'static) -> Self {
        ResponseFilter::Predicate(Arc::new(f))
    }

    pub fn content_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ResponseFilter::ContentTypes(types.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, response: &AuditResponse) -> bool {
        match self {
            ResponseFilter::Predicate(f) => f(response),
            ResponseFilter::ContentTypes(types) => {
                let content_type = response.get_header("content-type");
                types
                    .iter()
                    .any(|allowed| Some(allowed.as_str()) == content_type)
            }
        }
    }
}

impl fmt::Debug for ResponseFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFilter::Predicate(_) => f.write_str("Predicate(..)"),
            ResponseFilter::ContentTypes(types) => {
                f.debug_tuple("ContentTypes").field(types).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub request: Option<RequestFilter>,
    pub response: Option<ResponseFilter>,
}

impl FilterOptions {
    pub fn allows_request(&self, request: &AuditRequest) -> bool {
        self.request.as_ref().map_or(true, |filter| filter.matches(request))
    }

    pub fn allows_response(&self, response: &AuditResponse) -> bool {
        self.response.as_ref().map_or(true, |filter| filter.matches(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn request(method: &str) -> AuditRequest {
        AuditRequest {
            method: method.into(),
            ..AuditRequest::default()
        }
    }

    fn response(content_type: Option<&str>) -> AuditResponse {
        AuditResponse {
            status_code: 200,
            status_message: Some("OK".into()),
            headers: content_type
                .map(|ct| BTreeMap::from([("content-type".to_string(), ct.to_string())]))
                .unwrap_or_default(),
        }
    }

    #[test]
    fn test_no_filter_allows_everything() {
        let options = FilterOptions::default();
        assert!(options.allows_request(&request("GET")));
        assert!(options.allows_response(&response(None)));
    }

    #[test]
    fn test_method_filter_is_case_insensitive() {
        let filter = RequestFilter::methods(["post", "PUT"]);
        assert!(filter.matches(&request("POST")));
        assert!(filter.matches(&request("put")));
        assert!(!filter.matches(&request("GET")));
    }

    #[test]
    fn test_content_type_filter_is_exact() {
        let filter = ResponseFilter::content_types(["application/json"]);
        assert!(filter.matches(&response(Some("application/json"))));
        assert!(!filter.matches(&response(Some("application/json; charset=utf-8"))));
        assert!(!filter.matches(&response(None)));
    }

    #[test]
    fn test_predicates() {
        let options = FilterOptions {
            request: Some(RequestFilter::predicate(|req| req.url.starts_with("/api"))),
            response: Some(ResponseFilter::predicate(|res| res.status_code < 500)),
        };
        let mut api = request("GET");
        api.url = "/api/orders".into();
        assert!(options.allows_request(&api));
        assert!(!options.allows_request(&request("GET")));
        assert!(options.allows_response(&response(None)));
    }
}
