//! HTTP middleware.

pub mod request_logger;

pub use request_logger::{RequestLogger, RequestLoggerLayer};
