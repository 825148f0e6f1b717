//! Audit session composition and the finish pipeline.
//!
//! # Data Flow
//! ```text
//! AuditRequest
//!     → auditor.rs (request filter, session factory)
//!     → session.rs (instantiate plugins, assemble facades + AuditStore)
//!     → handler mutates stores through facades
//!     → Completion::finish (finish hooks in registration order)
//!     → response filter → subscribers (in subscription order)
//! ```
//!
//! # Design Decisions
//! - The aggregate holds the same store references as the facades (live view)
//! - Plugin names are unique per auditor; collisions are rejected up front
//! - A panicking finish hook or subscriber is logged and isolated

pub mod auditor;
pub mod filter;
pub mod session;
pub mod store;

pub use auditor::{Auditor, AuditorOptions, Completion, SubscriptionId};
pub use filter::{FilterOptions, RequestFilter, ResponseFilter};
pub use session::AuditSession;
pub use store::{AuditStore, StoreView};

use std::panic::{self, AssertUnwindSafe};

/// Errors raised while configuring an [`Auditor`].
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("plugin name must not be empty")]
    EmptyPluginName,

    #[error("plugin name `{0}` is reserved or already registered")]
    DuplicatePlugin(String),
}

/// Run an observer-supplied callback, logging instead of unwinding if it
/// panics.
pub(crate) fn run_isolated(stage: &'static str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(stage, reason = %reason, "audit callback panicked");
    }
}
