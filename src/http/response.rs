//! Response body accounting.
//!
//! # Responsibilities
//! - Count the bytes actually written for a response body
//! - Emit the pending access log record once the body is finished
//!
//! # Design Decisions
//! - Streaming responses are counted frame by frame, never buffered
//! - The record is emitted exactly once: at end of stream, on a body error,
//!   or when the body is dropped unread (HEAD, client gone)

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use chrono::Utc;
use http_body::{Body as HttpBody, Frame, SizeHint};

use crate::observability::event::PendingEvent;
use crate::observability::sink::LogSink;

struct Completion {
    event: PendingEvent,
    sink: Arc<dyn LogSink>,
}

/// Response body that reports its size to the access log.
pub struct LoggedBody {
    inner: Body,
    bytes_out: u64,
    completion: Option<Completion>,
}

impl LoggedBody {
    pub(crate) fn new(inner: Body, event: PendingEvent, sink: Arc<dyn LogSink>) -> Self {
        Self {
            inner,
            bytes_out: 0,
            completion: Some(Completion { event, sink }),
        }
    }

    /// Bytes written so far.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out
    }

    fn finish(&mut self) {
        if let Some(Completion { event, sink }) = self.completion.take() {
            sink.record(&event.complete(self.bytes_out, Utc::now()));
        }
    }
}

impl HttpBody for LoggedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.bytes_out += data.len() as u64;
                }
            }
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finish(),
            Poll::Pending => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for LoggedBody {
    fn drop(&mut self) {
        self.finish();
    }
}
