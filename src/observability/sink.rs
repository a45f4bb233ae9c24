//! Destinations for access log records.
//!
//! # Design Decisions
//! - The sink is handed to the middleware at construction time, never looked
//!   up from global state
//! - Sinks must tolerate concurrent callers; one call per request, no batching

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::Dispatch;

use crate::observability::event::{LogEvent, HTTP_REQUEST_EVENT};

/// Accepts completed access log records.
pub trait LogSink: Send + Sync + 'static {
    fn record(&self, event: &LogEvent);
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn record(&self, event: &LogEvent) {
        (**self).record(event)
    }
}

/// Emits each record as a `tracing` event at INFO level.
///
/// The target and the message are both `http_request`, so an `EnvFilter`
/// directive such as `http_request=info` selects access logs alone.
#[derive(Clone, Default)]
pub struct TracingSink {
    dispatch: Option<Dispatch>,
}

impl TracingSink {
    /// Log through whatever subscriber is the default at call time.
    pub fn new() -> Self {
        Self { dispatch: None }
    }

    /// Log through a specific subscriber.
    pub fn with_dispatch(dispatch: impl Into<Dispatch>) -> Self {
        Self {
            dispatch: Some(dispatch.into()),
        }
    }

    fn emit(event: &LogEvent) {
        tracing::info!(
            target: HTTP_REQUEST_EVENT,
            bytes_in = event.bytes_in.as_str(),
            bytes_out = event.bytes_out.as_str(),
            host = event.host.as_str(),
            id = event.id.as_str(),
            latency_human = event.latency_human.as_str(),
            latency = event.latency.as_str(),
            method = event.method.as_str(),
            remote_ip = event.remote_ip.as_str(),
            status = event.status,
            time = event.time.as_str(),
            uri = event.uri.as_str(),
            user_agent = event.user_agent.as_str(),
            error = event.error.as_deref(),
            "http_request"
        );
    }
}

impl std::fmt::Debug for TracingSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingSink")
            .field("injected", &self.dispatch.is_some())
            .finish()
    }
}

impl LogSink for TracingSink {
    fn record(&self, event: &LogEvent) {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, || Self::emit(event)),
            None => Self::emit(event),
        }
    }
}

/// Keeps records in memory, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<LogEvent> {
        std::mem::take(&mut *self.lock())
    }

    // A panic while holding the lock leaves the Vec intact, so keep using it.
    fn lock(&self) -> MutexGuard<'_, Vec<LogEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LogSink for MemorySink {
    fn record(&self, event: &LogEvent) {
        self.lock().push(event.clone());
    }
}
