use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::config::BackendConfig;
use crate::metrics::MetricSnapshot;

pub struct CapturedRequest {
    pub head: String,
    pub body: String,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
        })
    }
}

pub fn ok_response() -> String {
    response("200 OK", r#"{"took":3,"errors":false,"items":[]}"#)
}

pub fn response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\n\r\n{body}",
        body.len()
    )
}

/// Bind to port 0 and return the listener with its port.
pub async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Bind to port 0 and return the OS-assigned port.
/// The listener is dropped, so connections to the port are refused.
pub async fn free_port() -> u16 {
    listener().await.1
}

/// Accept a single HTTP request, reply with `response`, and return what was
/// received. Reads until the full `content-length` body has arrived.
pub async fn capture_request(listener: TcpListener, response: String) -> CapturedRequest {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers were received");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let body_len = head
        .lines()
        .find_map(|line| {
            let (k, v) = line.split_once(':')?;
            k.trim()
                .eq_ignore_ascii_case("content-length")
                .then(|| v.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + body_len {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body was received");
        buf.extend_from_slice(&chunk[..n]);
    }

    stream.write_all(response.as_bytes()).await.unwrap();
    stream.flush().await.unwrap();

    CapturedRequest {
        head,
        body: String::from_utf8_lossy(&buf[body_start..body_start + body_len]).to_string(),
    }
}

/// Config pointing at `127.0.0.1:{port}` with `overrides` merged into the
/// `elasticsearch` section.
pub fn local_config(port: u16, overrides: Value) -> BackendConfig {
    let mut section = json!({"host": "127.0.0.1", "port": port, "timeout": 2000});
    if let (Some(section), Value::Object(extra)) = (section.as_object_mut(), overrides) {
        section.extend(extra);
    }
    BackendConfig::from_value(&json!({ "elasticsearch": section })).unwrap()
}

/// Counters, timers with a zero sample, flattened timer_data, a zero gauge.
pub fn sample_snapshot() -> MetricSnapshot {
    serde_json::from_value(json!({
        "counters": {"hits": 5},
        "timers": {"latency": [10, 0, 20]},
        "timer_data": {"latency": {"mean": 15, "histogram": {"bin_10_20": 1}}},
        "gauges": {"mem": 0}
    }))
    .unwrap()
}
