//! HTTP request auditing layer.
//!
//! Every inbound request gets an [`AuditSession`]: a set of plugin facades
//! (`metadata`, `execution`, plus any registered externals) writing into one
//! aggregate [`AuditStore`]. When the response body finishes streaming, each
//! plugin's finish hook runs and the record is handed to the subscribers
//! registered with [`Auditor::on_finish`].
//!
//! ```ignore
//! let auditor = Auditor::new(
//!     AuditorOptions::new().with_request_filter(RequestFilter::methods(["POST", "PUT"])),
//! )?;
//! auditor.on_finish(|store| println!("{}", store.to_json()));
//!
//! let app = Router::new()
//!     .route("/users/{id}", put(update_user))
//!     .layer(axum::middleware::from_fn_with_state(auditor, audit_middleware));
//!
//! async fn update_user(session: AuditSession, Path(id): Path<String>) {
//!     session.metadata().set_type("user.update").add_object(format!("user:{id}"));
//! }
//! ```

pub mod audit;
pub mod capture;
pub mod config;
pub mod exception;
pub mod http;
pub mod observability;
pub mod plugins;

pub use audit::{
    AuditError, AuditSession, AuditStore, Auditor, AuditorOptions, RequestFilter, ResponseFilter,
};
pub use config::AuditConfig;
pub use http::{audit_middleware, AuditRequest, AuditResponse, HttpServer};
