//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! RequestLogger middleware
//!     → event.rs (PendingEvent closed into a LogEvent)
//!     → sink.rs (LogSink: tracing, memory)
//!     → logging.rs (subscriber: JSON lines or human output)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every access log record
//! - The sink is injected, so tests wire their own

pub mod event;
pub mod logging;
pub mod sink;

pub use event::{LogEvent, HTTP_REQUEST_EVENT};
pub use sink::{LogSink, MemorySink, TracingSink};
