//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware wiring)
//!     → middleware/request_logger.rs (request ID, clock, access log)
//!     → request.rs (resolve request ID, read request attributes)
//!     → handler → error.rs (handler errors become responses)
//!     → response.rs (count body bytes, emit the record)
//!     → Send to client
//! ```

pub mod error;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use error::{ErrorMessage, HandlerError};
pub use middleware::{RequestLogger, RequestLoggerLayer};
pub use request::{RequestId, RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
