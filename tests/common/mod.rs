//! Shared utilities for integration testing.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use request_logger::{HttpServer, ServerConfig, Shutdown, TracingSink};
use tokio::net::TcpListener;
use tracing_subscriber::fmt::MakeWriter;

/// In-memory writer the JSON subscriber writes log lines into.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Parsed JSON log lines written so far.
    pub fn lines(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Raw text written so far.
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Wait until `count` access log lines have been written.
    ///
    /// Records are emitted once the response body is flushed, which may be
    /// after the client has already read it.
    pub async fn wait_for_access_logs(&self, count: usize) -> Vec<serde_json::Value> {
        for _ in 0..100 {
            let lines: Vec<_> = self
                .lines()
                .into_iter()
                .filter(|line| line["message"] == "http_request")
                .collect();
            if lines.len() >= count {
                return lines;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("expected {} access log lines, got:\n{}", count, self.text());
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub logs: LogBuffer,
    shutdown: Shutdown,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Start the demo server, logging JSON lines into its own buffer.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let logs = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .json()
        .flatten_event(true)
        .with_writer(logs.clone())
        .finish();
    let sink = TracingSink::with_dispatch(subscriber);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, sink).unwrap();
    let stop = shutdown.wait();
    let handle = tokio::spawn(async move {
        server.run(listener, stop).await.unwrap();
    });

    TestServer {
        addr,
        logs,
        shutdown,
        handle,
    }
}
