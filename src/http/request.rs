//! Request identity and request-side accessors.
//!
//! # Responsibilities
//! - Resolve the correlation ID (reuse the caller's, or mint a UUID v7)
//! - Expose the resolved ID to handlers via request extensions
//! - Read the request attributes the access log reports
//!
//! # Design Decisions
//! - A caller-supplied ID is reused byte for byte
//! - Generated IDs are time ordered (UUID v7) so they sort roughly by arrival
//! - Missing attributes read as empty strings, never as errors

use std::fmt;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts, OriginalUri},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
};
use uuid::Uuid;

/// Header name used for the request identifier.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Correlation ID of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(HeaderValue);

impl RequestId {
    /// Wrap an existing header value.
    pub fn new(value: HeaderValue) -> Self {
        Self(value)
    }

    /// Mint a fresh time-ordered ID.
    pub fn generate() -> Self {
        let id = Uuid::now_v7().hyphenated().to_string();
        Self(HeaderValue::from_str(&id).expect("hyphenated UUID is a valid header value"))
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.0.as_bytes()))
    }
}

impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Request ID missing"))
    }
}

/// Access to the resolved [`RequestId`] of a request.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&RequestId>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions().get::<RequestId>()
    }
}

impl RequestIdExt for Parts {
    fn request_id(&self) -> Option<&RequestId> {
        self.extensions.get::<RequestId>()
    }
}

/// Resolve the correlation ID carried under `name`.
///
/// A present, non-empty value is reused as is. Otherwise a new ID is
/// generated and written back into `headers`, replacing any empty value.
pub fn resolve_request_id(headers: &mut HeaderMap, name: &HeaderName) -> RequestId {
    match headers.get(name) {
        Some(value) if !value.is_empty() => RequestId::new(value.clone()),
        _ => {
            let id = RequestId::generate();
            headers.insert(name.clone(), id.header_value().clone());
            id
        }
    }
}

/// Header value as text, or an empty string when absent.
pub fn header_text(headers: &HeaderMap, name: impl header::AsHeaderName) -> String {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}

/// Declared request body size; `"0"` when the header is absent or empty.
pub fn content_length(headers: &HeaderMap) -> String {
    let value = header_text(headers, header::CONTENT_LENGTH);
    if value.is_empty() {
        "0".to_string()
    } else {
        value
    }
}

/// Host the request was addressed to, port included when given.
pub fn host<B>(request: &Request<B>) -> String {
    let from_header = header_text(request.headers(), header::HOST);
    if !from_header.is_empty() {
        return from_header;
    }
    request
        .uri()
        .authority()
        .map(|authority| authority.to_string())
        .unwrap_or_default()
}

/// Request target as received, query string included.
pub fn request_uri<B>(request: &Request<B>) -> String {
    match request.extensions().get::<OriginalUri>() {
        Some(OriginalUri(uri)) => uri.to_string(),
        None => request.uri().to_string(),
    }
}

/// Best-effort client IP.
///
/// With `trust_proxy_headers` the first `X-Forwarded-For` entry wins, then
/// `X-Real-IP`. Otherwise, or when neither is set, the peer address from
/// `ConnectInfo` is used. Empty when nothing is known.
pub fn client_ip<B>(request: &Request<B>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(ip) = forwarded_ip(request.headers()) {
            return ip;
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded_for = header_text(headers, "x-forwarded-for");
    let first = forwarded_for.split(',').next().map(str::trim).unwrap_or("");
    if !first.is_empty() {
        return Some(strip_brackets(first).to_string());
    }

    let real_ip = header_text(headers, "x-real-ip");
    let real_ip = real_ip.trim();
    if !real_ip.is_empty() {
        return Some(strip_brackets(real_ip).to_string());
    }

    None
}

// IPv6 literals may arrive as "[::1]".
fn strip_brackets(ip: &str) -> &str {
    ip.strip_prefix('[')
        .and_then(|ip| ip.strip_suffix(']'))
        .unwrap_or(ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request() -> axum::http::request::Builder {
        Request::builder().uri("/search?q=rust")
    }

    #[test]
    fn test_existing_id_is_reused() {
        let mut headers = HeaderMap::new();
        headers.insert(&X_REQUEST_ID, HeaderValue::from_static("unique-id"));

        let id = resolve_request_id(&mut headers, &X_REQUEST_ID);
        assert_eq!(id.to_string(), "unique-id");
        assert_eq!(headers.get(&X_REQUEST_ID).unwrap(), "unique-id");
    }

    #[test]
    fn test_missing_id_is_generated_and_written_back() {
        let mut headers = HeaderMap::new();

        let id = resolve_request_id(&mut headers, &X_REQUEST_ID);
        let uuid = Uuid::parse_str(&id.to_string()).unwrap();
        assert_eq!(uuid.get_version_num(), 7);
        assert_eq!(headers.get(&X_REQUEST_ID), Some(id.header_value()));
    }

    #[test]
    fn test_empty_id_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(&X_REQUEST_ID, HeaderValue::from_static(""));

        let id = resolve_request_id(&mut headers, &X_REQUEST_ID);
        assert!(!id.header_value().is_empty());
        assert_eq!(headers.get_all(&X_REQUEST_ID).iter().count(), 1);
        assert_eq!(headers.get(&X_REQUEST_ID), Some(id.header_value()));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let name = HeaderName::from_static("x-correlation-id");
        let req = request()
            .header("X-Correlation-ID", "abc")
            .body(Body::empty())
            .unwrap();
        let (mut parts, _) = req.into_parts();

        let id = resolve_request_id(&mut parts.headers, &name);
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn test_generated_ids_are_ordered() {
        let first = RequestId::generate().to_string();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = RequestId::generate().to_string();
        assert!(first < second);
    }

    #[test]
    fn test_content_length_defaults_to_zero() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), "0");

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static(""));
        assert_eq!(content_length(&headers), "0");

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("42"));
        assert_eq!(content_length(&headers), "42");
    }

    #[test]
    fn test_host_from_header_or_authority() {
        let req = request()
            .header("Host", "example.com:8080")
            .body(Body::empty())
            .unwrap();
        assert_eq!(host(&req), "example.com:8080");

        let req = Request::builder()
            .uri("http://api.example.com/v1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(host(&req), "api.example.com");

        let req = request().body(Body::empty()).unwrap();
        assert_eq!(host(&req), "");
    }

    #[test]
    fn test_request_uri_keeps_query() {
        let req = request().body(Body::empty()).unwrap();
        assert_eq!(request_uri(&req), "/search?q=rust");
    }

    #[test]
    fn test_client_ip_resolution_order() {
        let peer: SocketAddr = "192.168.1.10:5555".parse().unwrap();

        let mut req = request()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .header("X-Real-IP", "198.51.100.2")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(peer));
        assert_eq!(client_ip(&req, true), "203.0.113.7");
        assert_eq!(client_ip(&req, false), "192.168.1.10");

        let req = request()
            .header("X-Real-IP", "[2001:db8::1]")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req, true), "2001:db8::1");

        let req = request().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req, true), "");
    }

    #[test]
    fn test_request_id_ext() {
        let mut req = request().body(Body::empty()).unwrap();
        assert!(req.request_id().is_none());

        req.extensions_mut()
            .insert(RequestId::new(HeaderValue::from_static("abc")));
        assert_eq!(req.request_id().unwrap().to_string(), "abc");

        let (parts, _) = req.into_parts();
        assert_eq!(parts.request_id().unwrap().to_string(), "abc");
    }
}
