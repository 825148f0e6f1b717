//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the demo handlers
//! - Wire up middleware (tracing, body parser, audit)
//! - Bind server to listener with connect info
//! - Graceful shutdown on Ctrl+C

use axum::{middleware::from_fn_with_state, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::audit::Auditor;
use crate::config::AuditConfig;
use crate::http::handlers;
use crate::http::middleware::{audit_middleware, parse_body_middleware};

/// HTTP server hosting audited routes.
pub struct HttpServer {
    router: Router,
    config: AuditConfig,
}

impl HttpServer {
    /// Create a server for the built-in demo routes.
    pub fn new(config: AuditConfig, auditor: Auditor) -> Self {
        Self::with_routes(config, auditor, handlers::routes())
    }

    /// Create a server for caller-supplied routes.
    pub fn with_routes(config: AuditConfig, auditor: Auditor, routes: Router) -> Self {
        let router = Self::build_router(&config, auditor, routes);
        Self { router, config }
    }

    /// Layer order, outermost first: trace → body parser → audit → routes.
    pub fn build_router(config: &AuditConfig, auditor: Auditor, routes: Router) -> Router {
        routes
            .layer(from_fn_with_state(auditor, audit_middleware))
            .layer(from_fn_with_state(config.body.clone(), parse_body_middleware))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, e.g. for driving requests in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AuditConfig {
        &self.config
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(err) => {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
