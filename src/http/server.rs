//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (body limit, timeout, error tagging, access log)
//! - Route misses and wrong methods through `HandlerError`
//! - Serve on a listener until shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer};

use crate::config::ServerConfig;
use crate::http::error::{tag_framework_errors, HandlerError};
use crate::http::middleware::RequestLoggerLayer;
use crate::http::request::RequestId;
use crate::observability::sink::LogSink;

/// Errors raised while setting up or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid request ID header name: {0}")]
    HeaderName(#[from] axum::http::header::InvalidHeaderName),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server with the access log middleware in front of every route.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server logging access records to `sink`.
    pub fn new(config: ServerConfig, sink: impl LogSink) -> Result<Self, ServerError> {
        let logger = RequestLoggerLayer::from_config(sink, &config.request_log)?;
        let router = Self::build_router(&config, logger);
        Ok(Self { router })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, logger: RequestLoggerLayer) -> Router {
        Router::new()
            .route("/", get(index))
            .route("/empty", get(empty))
            .route("/error", get(error))
            .route("/id", get(echo_id))
            .route("/echo", post(echo_json))
            .fallback(not_found)
            .method_not_allowed_fallback(method_not_allowed)
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(middleware::map_response(tag_framework_errors))
            .layer(logger)
    }

    /// The fully layered router, for driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn index() -> &'static str {
    "abcd"
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn error() -> Result<(), HandlerError> {
    Err(HandlerError::new("some error message"))
}

async fn echo_id(id: RequestId) -> String {
    id.to_string()
}

async fn echo_json(Json(value): Json<serde_json::Value>) -> Json<serde_json::Value> {
    Json(value)
}

async fn not_found() -> HandlerError {
    HandlerError::with_status(StatusCode::NOT_FOUND, "Not Found")
}

async fn method_not_allowed() -> HandlerError {
    HandlerError::with_status(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}
