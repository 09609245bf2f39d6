//! HTTP(S) delivery to the remote collector.
//!
//! Each payload is a single `POST` with an `application/octet-stream`
//! body. The collector's response body is ignored; only the status
//! matters. There is no retry: a failed payload is discarded and the
//! next cycle sends the next one.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::FramecastError;
use crate::sink::{FrameSink, SendOutcome, SingleFlight};

// ── TrustMode ────────────────────────────────────────────────────

/// Certificate validation policy for HTTPS endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustMode {
    /// Accept any certificate, so self-signed collectors work.
    #[default]
    Bypass,
    /// Validate certificates against the bundled web roots.
    Strict,
}

// ── Endpoint ─────────────────────────────────────────────────────

/// Collector address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// `https` or `http`.
    pub scheme: String,
    pub host: String,
    pub port: u16,
    /// Request path, e.g. `/`.
    pub path: String,
}

impl Endpoint {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            path: "/".into(),
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn url(&self) -> String {
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };
        format!("{}://{}:{}{}", self.scheme, self.host, self.port, path)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

// ── HttpSender ───────────────────────────────────────────────────

/// Single-flight HTTP(S) POST sender.
pub struct HttpSender {
    client: reqwest::Client,
    url: String,
    flight: SingleFlight,
}

impl HttpSender {
    /// Build a sender for `endpoint`.
    ///
    /// `timeout` bounds each whole transfer; `None` keeps the client
    /// default (no deadline).
    pub fn new(
        endpoint: &Endpoint,
        trust: TrustMode,
        timeout: Option<Duration>,
    ) -> Result<Self, FramecastError> {
        if !matches!(endpoint.scheme.as_str(), "http" | "https") {
            return Err(FramecastError::Config(format!(
                "unsupported scheme {:?}; expected http or https",
                endpoint.scheme
            )));
        }
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(trust == TrustMode::Bypass);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        if trust == TrustMode::Bypass && endpoint.scheme == "https" {
            info!("certificate validation disabled for {endpoint}");
        }

        Ok(Self {
            client,
            url: endpoint.url(),
            flight: SingleFlight::new(),
        })
    }

    /// Whether a transfer is currently active.
    pub fn is_in_flight(&self) -> bool {
        self.flight.is_in_flight()
    }

    async fn post(&self, payload: Bytes) -> SendOutcome {
        let bytes = payload.len();
        debug!(bytes, url = %self.url, "sending payload");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => {
                debug!(bytes, "payload delivered");
                SendOutcome::Delivered { bytes }
            }
            Ok(resp) => {
                let status = resp.status();
                warn!(%status, "collector rejected payload");
                SendOutcome::Failed(format!("collector responded with {status}"))
            }
            Err(e) => {
                warn!("error sending payload: {e}");
                SendOutcome::Failed(e.to_string())
            }
        }
    }
}

#[async_trait]
impl FrameSink for HttpSender {
    async fn send(&self, payload: Bytes) -> SendOutcome {
        let Some(_guard) = self.flight.try_begin() else {
            debug!(bytes = payload.len(), "send already in flight; dropping payload");
            return SendOutcome::Skipped;
        };
        self.post(payload).await
    }

    fn describe(&self) -> String {
        format!("http sink → {}", self.url)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one connection, read one request, wait `delay`, then
    /// answer with `status`. Returns the received body.
    async fn serve_once(listener: TcpListener, delay: Duration, status: &'static str) -> Vec<u8> {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let (header_end, content_length) = loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed before sending a request");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                break (pos + 4, len);
            }
        };
        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
        }
        tokio::time::sleep(delay).await;
        let response = format!("HTTP/1.1 {status}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nOK");
        stream.write_all(response.as_bytes()).await.unwrap();
        buf[header_end..].to_vec()
    }

    async fn local_endpoint() -> (TcpListener, Endpoint) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, Endpoint::new("http", "127.0.0.1", port))
    }

    #[test]
    fn endpoint_url() {
        let ep = Endpoint::new("https", "192.168.1.101", 34545);
        assert_eq!(ep.url(), "https://192.168.1.101:34545/");
        assert_eq!(ep.with_path("ingest").url(), "https://192.168.1.101:34545/ingest");
    }

    #[test]
    fn rejects_unknown_scheme() {
        let ep = Endpoint::new("ftp", "127.0.0.1", 21);
        let err = HttpSender::new(&ep, TrustMode::Strict, None).err().unwrap();
        assert!(matches!(err, FramecastError::Config(_)));
    }

    #[tokio::test]
    async fn delivers_octet_stream_body() {
        let (listener, endpoint) = local_endpoint().await;
        let server = tokio::spawn(serve_once(listener, Duration::ZERO, "200 OK"));

        let sender = HttpSender::new(&endpoint, TrustMode::Strict, None).unwrap();
        let outcome = sender.send(Bytes::from_static(b"frame-bytes")).await;

        assert_eq!(outcome, SendOutcome::Delivered { bytes: 11 });
        assert_eq!(server.await.unwrap(), b"frame-bytes");
        assert!(!sender.is_in_flight());
    }

    #[tokio::test]
    async fn non_success_status_is_failure() {
        let (listener, endpoint) = local_endpoint().await;
        tokio::spawn(serve_once(listener, Duration::ZERO, "500 Internal Server Error"));

        let sender = HttpSender::new(&endpoint, TrustMode::Bypass, None).unwrap();
        let outcome = sender.send(Bytes::from_static(b"x")).await;

        assert!(matches!(outcome, SendOutcome::Failed(ref cause) if cause.contains("500")));
        assert!(!sender.is_in_flight());
    }

    #[tokio::test]
    async fn unreachable_collector_is_failure() {
        let (listener, endpoint) = local_endpoint().await;
        drop(listener);

        let sender =
            HttpSender::new(&endpoint, TrustMode::Bypass, Some(Duration::from_secs(2))).unwrap();
        let outcome = sender.send(Bytes::from_static(b"x")).await;

        assert!(matches!(outcome, SendOutcome::Failed(_)));
        assert!(!sender.is_in_flight());
    }

    #[tokio::test]
    async fn overlapping_send_is_skipped() {
        let (listener, endpoint) = local_endpoint().await;
        let server = tokio::spawn(serve_once(listener, Duration::from_millis(300), "200 OK"));

        let sender = Arc::new(HttpSender::new(&endpoint, TrustMode::Bypass, None).unwrap());
        let first = tokio::spawn({
            let sender = Arc::clone(&sender);
            async move { sender.send(Bytes::from_static(b"first")).await }
        });

        // Wait until the first transfer holds the slot.
        while !sender.is_in_flight() {
            tokio::task::yield_now().await;
        }

        let second = sender.send(Bytes::from_static(b"second")).await;
        assert_eq!(second, SendOutcome::Skipped);
        assert!(sender.is_in_flight());

        assert!(first.await.unwrap().is_delivered());
        assert_eq!(server.await.unwrap(), b"first");
        assert!(!sender.is_in_flight());
    }
}
