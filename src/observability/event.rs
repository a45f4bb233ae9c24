//! The per-request access log record.
//!
//! # Field contract
//! One record is produced per request/response cycle. Field names, their
//! order, and their presence rules are consumed by log parsers downstream:
//!
//! | field           | value                                          |
//! |-----------------|------------------------------------------------|
//! | `bytes_in`      | inbound `Content-Length`, `"0"` when absent    |
//! | `bytes_out`     | bytes written to the response body            |
//! | `host`          | request host                                   |
//! | `id`            | resolved correlation ID                        |
//! | `latency_human` | human readable duration (`1.2ms`)              |
//! | `latency`       | duration in nanoseconds                        |
//! | `method`        | HTTP method                                    |
//! | `remote_ip`     | best-effort client IP                          |
//! | `status`        | numeric status code                            |
//! | `time`          | RFC3339 completion time, nanosecond precision  |
//! | `uri`           | request URI including the query string         |
//! | `user_agent`    | request `User-Agent`                           |
//! | `error`         | handler error text, only when one occurred     |

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

/// Event name and log target of every access log record.
pub const HTTP_REQUEST_EVENT: &str = "http_request";

/// A completed access log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    pub bytes_in: String,
    pub bytes_out: String,
    pub host: String,
    pub id: String,
    pub latency_human: String,
    pub latency: String,
    pub method: String,
    pub remote_ip: String,
    pub status: u16,
    pub time: String,
    pub uri: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything known about a request once its handler has returned.
///
/// Only the response byte count is still open; it is filled in when the
/// body has been written out.
#[derive(Debug, Clone)]
pub struct PendingEvent {
    pub bytes_in: String,
    pub host: String,
    pub id: String,
    pub latency: Duration,
    pub method: String,
    pub remote_ip: String,
    pub status: u16,
    pub uri: String,
    pub user_agent: String,
    pub error: Option<String>,
}

impl PendingEvent {
    /// Close the record with the final byte count, stamped with `now`.
    pub fn complete(self, bytes_out: u64, now: DateTime<Utc>) -> LogEvent {
        LogEvent {
            bytes_in: self.bytes_in,
            bytes_out: bytes_out.to_string(),
            host: self.host,
            id: self.id,
            latency_human: format_latency(self.latency),
            latency: self.latency.as_nanos().to_string(),
            method: self.method,
            remote_ip: self.remote_ip,
            status: self.status,
            time: now.to_rfc3339_opts(SecondsFormat::Nanos, true),
            uri: self.uri,
            user_agent: self.user_agent,
            error: self.error,
        }
    }
}

/// Human form of a latency, e.g. `1.2ms` or `850µs`.
pub fn format_latency(latency: Duration) -> String {
    format!("{:?}", latency)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pending(error: Option<&str>) -> PendingEvent {
        PendingEvent {
            bytes_in: "0".into(),
            host: "example.com".into(),
            id: "unique-id".into(),
            latency: Duration::from_micros(1200),
            method: "GET".into(),
            remote_ip: "10.0.0.1".into(),
            status: 200,
            uri: "/search?q=rust".into(),
            user_agent: "curl/8.0".into(),
            error: error.map(String::from),
        }
    }

    #[test]
    fn test_complete_formats_numbers_and_time() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        let event = pending(None).complete(4, now);

        assert_eq!(event.bytes_out, "4");
        assert_eq!(event.latency, "1200000");
        assert_eq!(event.latency_human, "1.2ms");
        assert_eq!(event.time, "2024-05-01T12:30:00.000000000Z");
    }

    #[test]
    fn test_serialized_field_order() {
        let json = serde_json::to_string(&pending(Some("boom")).complete(0, Utc::now())).unwrap();
        let positions: Vec<_> = [
            "\"bytes_in\"", "\"bytes_out\"", "\"host\"", "\"id\"", "\"latency_human\"",
            "\"latency\"", "\"method\"", "\"remote_ip\"", "\"status\"", "\"time\"",
            "\"uri\"", "\"user_agent\"", "\"error\"",
        ]
        .iter()
        .map(|key| json.find(key).unwrap())
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]), "{}", json);
    }

    #[test]
    fn test_json_skips_absent_error() {
        let json = serde_json::to_value(pending(None).complete(0, Utc::now())).unwrap();
        let object = json.as_object().unwrap();
        assert_eq!(object.len(), 12);
        assert!(!object.contains_key("error"));
        assert_eq!(object["status"], 200);

        let json = serde_json::to_value(pending(Some("boom")).complete(0, Utc::now())).unwrap();
        assert_eq!(json["error"], "boom");
    }

    #[test]
    fn test_format_latency() {
        assert_eq!(format_latency(Duration::from_nanos(850_000)), "850µs");
        assert_eq!(format_latency(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_latency(Duration::ZERO), "0ns");
    }
}
