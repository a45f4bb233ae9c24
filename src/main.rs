//! Request logger demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ RequestLogger ──▶ timeout ──▶ body limit ──▶ handler
//!                          │                                          │
//!                          │ request ID, clock                        │ response or
//!                          │                                          │ HandlerError
//!     Client Response      ▼                                          ▼
//!     ◀────────────── LoggedBody (bytes_out) ◀──────────────── IntoResponse
//!                          │
//!                          ▼
//!                  http_request record → TracingSink → stdout (JSON)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use request_logger::config::{load_config, ServerConfig};
use request_logger::lifecycle::{shutdown_signal, Shutdown};
use request_logger::observability::{logging, TracingSink};
use request_logger::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "request-logger", version, about = "HTTP server with structured access logging")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;

    tracing::info!("request-logger v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        header_name = %config.request_log.header_name,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let shutdown = Shutdown::new();
    let stop = shutdown.wait();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    });

    let server = HttpServer::new(config, TracingSink::new())?;
    server.run(listener, stop).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
