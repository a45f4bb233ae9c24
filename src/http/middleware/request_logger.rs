//! Access log middleware.
//!
//! Wraps the rest of the chain and produces one `http_request` record per
//! request/response cycle.
//!
//! # Per-request flow
//! ```text
//! entry: start clock, resolve request ID (reuse or generate),
//!        write it into the request headers and extensions
//!     → inner service
//!     → stop clock, mirror request ID onto the response,
//!       pick up the handler's ErrorMessage if any
//!     → LoggedBody counts the bytes written and emits the record
//! ```
//!
//! Handler errors have already been turned into responses by the time the
//! inner service returns, so the middleware only observes them. An `Err`
//! from the inner service itself is logged and then handed back unchanged.

use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderName, Request, Response},
    BoxError,
};
use chrono::Utc;
use futures_util::future::BoxFuture;
use http_body::Body as HttpBody;
use tower::{Layer, Service};

use crate::config::RequestLogConfig;
use crate::http::error::ErrorMessage;
use crate::http::request::{self, RequestId, X_REQUEST_ID};
use crate::http::response::LoggedBody;
use crate::observability::event::PendingEvent;
use crate::observability::sink::LogSink;

/// Layer that applies [`RequestLogger`].
#[derive(Clone)]
pub struct RequestLoggerLayer {
    sink: Arc<dyn LogSink>,
    header_name: HeaderName,
    trust_proxy_headers: bool,
}

impl RequestLoggerLayer {
    /// Log to `sink`, using `x-request-id` and trusting proxy headers.
    pub fn new(sink: impl LogSink) -> Self {
        Self {
            sink: Arc::new(sink),
            header_name: X_REQUEST_ID.clone(),
            trust_proxy_headers: true,
        }
    }

    /// Build from configuration. The header name must already be valid.
    pub fn from_config(
        sink: impl LogSink,
        config: &RequestLogConfig,
    ) -> Result<Self, header::InvalidHeaderName> {
        let header_name = HeaderName::from_bytes(config.header_name.as_bytes())?;
        Ok(Self::new(sink)
            .header_name(header_name)
            .trust_proxy_headers(config.trust_proxy_headers))
    }

    /// Header carrying the correlation ID in and out.
    pub fn header_name(mut self, name: HeaderName) -> Self {
        self.header_name = name;
        self
    }

    /// Whether `remote_ip` may come from `X-Forwarded-For` / `X-Real-IP`.
    pub fn trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }
}

impl fmt::Debug for RequestLoggerLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLoggerLayer")
            .field("header_name", &self.header_name)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .finish()
    }
}

impl<S> Layer<S> for RequestLoggerLayer {
    type Service = RequestLogger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogger {
            inner,
            sink: self.sink.clone(),
            header_name: self.header_name.clone(),
            trust_proxy_headers: self.trust_proxy_headers,
        }
    }
}

/// Middleware emitting one access log record per request.
#[derive(Clone)]
pub struct RequestLogger<S> {
    inner: S,
    sink: Arc<dyn LogSink>,
    header_name: HeaderName,
    trust_proxy_headers: bool,
}

/// Request attributes captured before the request is handed on.
struct RequestSummary {
    bytes_in: String,
    host: String,
    method: String,
    remote_ip: String,
    uri: String,
    user_agent: String,
}

impl RequestSummary {
    fn capture<B>(req: &Request<B>, trust_proxy_headers: bool) -> Self {
        Self {
            bytes_in: request::content_length(req.headers()),
            host: request::host(req),
            method: req.method().to_string(),
            remote_ip: request::client_ip(req, trust_proxy_headers),
            uri: request::request_uri(req),
            user_agent: request::header_text(req.headers(), header::USER_AGENT),
        }
    }

    fn into_pending(
        self,
        id: &RequestId,
        latency: Duration,
        status: u16,
        error: Option<String>,
    ) -> PendingEvent {
        PendingEvent {
            bytes_in: self.bytes_in,
            host: self.host,
            id: id.to_string(),
            latency,
            method: self.method,
            remote_ip: self.remote_ip,
            status,
            uri: self.uri,
            user_agent: self.user_agent,
            error,
        }
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestLogger<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: fmt::Display,
    ReqBody: Send + 'static,
    ResBody: HttpBody<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();

        let request_id = request::resolve_request_id(req.headers_mut(), &self.header_name);
        req.extensions_mut().insert(request_id.clone());
        let summary = RequestSummary::capture(&req, self.trust_proxy_headers);

        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let sink = self.sink.clone();
        let header_name = self.header_name.clone();

        Box::pin(async move {
            let result = inner.call(req).await;
            let latency = start.elapsed();

            match result {
                Ok(mut response) => {
                    response
                        .headers_mut()
                        .insert(header_name, request_id.header_value().clone());

                    let error = response
                        .extensions()
                        .get::<ErrorMessage>()
                        .map(|ErrorMessage(message)| message.clone());
                    let pending = summary.into_pending(
                        &request_id,
                        latency,
                        response.status().as_u16(),
                        error,
                    );

                    Ok(response.map(|body| {
                        Body::new(LoggedBody::new(Body::new(body), pending, sink))
                    }))
                }
                Err(err) => {
                    let pending =
                        summary.into_pending(&request_id, latency, 500, Some(err.to_string()));
                    sink.record(&pending.complete(0, Utc::now()));
                    Err(err)
                }
            }
        })
    }
}
