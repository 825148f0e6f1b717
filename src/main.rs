//! request-auditor demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ─▶ body parser ─▶ audit middleware ─▶ handler
//!                                                    │  session into       │
//!                                                    │  extensions         │ metadata / execution
//!                                                    ▼                     ▼ facades
//!     Client Response                          InterceptedBody ◀──── response
//!     ◀──────────────────────────────────────── (captures body)
//!                                                    │ end of stream
//!                                                    ▼
//!                                   finish hooks → response filter → subscribers
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use request_auditor::config::{load_config, AuditConfig};
use request_auditor::observability::{init_logging, log_record};
use request_auditor::{Auditor, AuditorOptions, HttpServer};

#[derive(Parser)]
#[command(name = "request-auditor")]
#[command(about = "Demo HTTP server with request auditing", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AuditConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }

    init_logging(&config.observability.log_level);
    tracing::info!("request-auditor v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        methods = ?config.filter.methods,
        content_types = ?config.filter.content_types,
        "Configuration loaded"
    );

    let auditor = Auditor::new(AuditorOptions::from_config(&config.filter))?;
    if config.observability.log_records {
        auditor.on_finish(log_record);
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        "Listening for connections"
    );

    let server = HttpServer::new(config, auditor);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
