//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AuditConfig (validated, immutable)
//!     → AuditorOptions::from_config (declarative filters)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Predicate filters and external plugins are code-only; the file covers
//!   the declarative allow-lists

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{AuditConfig, BodyConfig, FilterConfig, ObservabilityConfig, ServerConfig};
pub use validation::{validate_config, ValidationError};
