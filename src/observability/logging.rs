//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Log finished audit records
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Log level configurable via config and environment

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::audit::AuditStore;

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("request_auditor={level},audit={level},tower_http={level}").into()
    });

    let initialized = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if initialized.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
}

/// Finish subscriber that writes the record as one JSON log line.
pub fn log_record(store: &AuditStore) {
    let execution = store.execution();
    let (method, url, status) = (
        execution.request.method.clone(),
        execution.request.url.clone(),
        execution.response.status_code,
    );
    drop(execution);

    tracing::info!(
        target: "audit",
        method = %method,
        url = %url,
        status = ?status,
        record = %store.to_json(),
        "Audit record"
    );
}
