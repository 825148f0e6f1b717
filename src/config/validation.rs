//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (body limit > 0, parseable bind address)
//! - Reject filter entries that can never match
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AuditConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::Method;
use std::net::SocketAddr;

use crate::config::schema::AuditConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    BindAddress(String),

    #[error("`{0}` is not a valid HTTP method")]
    Method(String),

    #[error("content type filter entries must not be empty")]
    EmptyContentType,

    #[error("body.max_bytes must be greater than zero")]
    BodyLimit,

    #[error("unknown log level `{0}`")]
    LogLevel(String),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &AuditConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.server.bind_address.clone()));
    }

    for method in &config.filter.methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::Method(method.clone()));
        }
    }

    if config.filter.content_types.iter().any(|ct| ct.trim().is_empty()) {
        errors.push(ValidationError::EmptyContentType);
    }

    if config.body.max_bytes == 0 {
        errors.push(ValidationError::BodyLimit);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
