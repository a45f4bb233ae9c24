//! Handler errors and their translation into responses.
//!
//! # Data Flow
//! ```text
//! handler returns Err(HandlerError)
//!     → IntoResponse (status + JSON body for the client)
//!     → ErrorMessage response extension (full error text)
//!     → RequestLogger reads it into the `error` field
//! ```
//!
//! Failures the framework produces on its own (unmatched route, wrong
//! method, extractor rejection, body limit, timeout) carry no
//! `ErrorMessage`; [`tag_framework_errors`] labels them with the status
//! reason so they reach the log as errors too.
//!
//! # Design Decisions
//! - Server error text is never shown to the client; it only reaches the log
//! - Any error type may attach an [`ErrorMessage`] to join the access log

use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Response extension carrying the text of the error that produced the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage(pub String);

/// Error returned by application handlers.
#[derive(Debug)]
pub struct HandlerError {
    status: StatusCode,
    message: String,
}

impl HandlerError {
    /// An internal error (500) with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_status(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn public_message(&self) -> &str {
        if self.status.is_server_error() {
            self.status
                .canonical_reason()
                .unwrap_or("Internal Server Error")
        } else {
            &self.message
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<E> From<E> for HandlerError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::new(err.to_string())
    }
}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        tracing::debug!(
            status = %self.status,
            error = %self.message,
            "Handler returned an error"
        );

        let body = Json(json!({ "message": self.public_message() }));
        let mut response = (self.status, body).into_response();
        response
            .extensions_mut()
            .insert(ErrorMessage(self.message));
        response
    }
}

/// Label 4xx/5xx responses that have no [`ErrorMessage`] yet.
///
/// For use with `axum::middleware::map_response`, inside the access log
/// layer. A message attached by a handler error is left as is.
pub async fn tag_framework_errors(mut response: Response) -> Response {
    let status = response.status();
    let failed = status.is_client_error() || status.is_server_error();
    if failed && response.extensions().get::<ErrorMessage>().is_none() {
        let reason = status.canonical_reason().unwrap_or(status.as_str());
        response
            .extensions_mut()
            .insert(ErrorMessage(reason.to_string()));
    }
    response
}
