//! Axum middleware.

pub mod audit;
pub mod body_parser;

pub use audit::{audit_middleware, AuditSessionMissing};
pub use body_parser::{parse_body_middleware, ParsedBody};
