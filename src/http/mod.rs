//! HTTP integration subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → middleware/body_parser.rs (pre-parse JSON/form/text bodies)
//!     → middleware/audit.rs (AuditRequest snapshot, session into extensions)
//!     → handlers.rs (use AuditSession facades)
//!     → middleware/audit.rs (AuditResponse, wrap body in InterceptedBody)
//!     → Send to client; end of body triggers the finish pipeline
//! ```

pub mod handlers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::{audit_middleware, parse_body_middleware, AuditSessionMissing, ParsedBody};
pub use request::AuditRequest;
pub use response::AuditResponse;
pub use server::HttpServer;
