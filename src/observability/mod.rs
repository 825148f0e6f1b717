//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields)
//!     → logging.rs (subscriber: env filter + fmt layer)
//!
//! Finished audit records:
//!     → Auditor subscribers
//!     → logging.rs::log_record (one JSON line per record, target `audit`)
//! ```
//!
//! # Design Decisions
//! - Structured logging via the tracing crate
//! - `RUST_LOG` overrides the configured level
//! - Record logging is just another subscriber; persistence is left to
//!   whoever subscribes

pub mod logging;

pub use logging::{init_logging, log_record};
