//! Exception capture.
//!
//! # Data Flow
//! ```text
//! handler error { name, message, stack }
//!     → ExceptionData::capture (stamps launchedAt)
//!     → stack_trace.rs (raw text → frames)
//!     → ExecutionStore.exception (last write wins)
//! ```

pub mod stack_trace;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use stack_trace::{parse_stack_trace, StackTrace};

/// An exception recorded against an audit session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionData {
    pub name: String,
    pub message: String,
    pub stack: Vec<StackTrace>,
    /// When the exception was captured, independent of request timing.
    pub launched_at: DateTime<Utc>,
}

impl ExceptionData {
    /// Build an exception record from its raw parts. A missing stack yields
    /// no frames.
    pub fn capture(
        name: impl Into<String>,
        message: impl Into<String>,
        stack: Option<&str>,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: stack.map(parse_stack_trace).unwrap_or_default(),
            launched_at: Utc::now(),
        }
    }
}
