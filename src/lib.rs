//! Access logging middleware for Axum/Tower HTTP servers.
//!
//! Every request gets a correlation ID (reused from `X-Request-Id` or a
//! fresh UUID v7) and produces exactly one structured `http_request` record
//! once its response has been written.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ServerConfig;
pub use http::{HandlerError, HttpServer, RequestId, RequestLoggerLayer};
pub use lifecycle::Shutdown;
pub use observability::{LogEvent, LogSink, MemorySink, TracingSink};
