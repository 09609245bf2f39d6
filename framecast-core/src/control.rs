//! Inbound control channel.
//!
//! A small HTTP listener that accepts JSON command messages on its own
//! thread and actix system, so it never shares the capture cadence's
//! timing budget. Parsed messages are forwarded on a channel; the
//! listener itself attaches no meaning to them.
//!
//! There is no authentication. Bind it to a trusted interface.

use std::net::{SocketAddr, TcpListener};
use std::thread::JoinHandle;

use actix_web::http::KeepAlive;
use actix_web::{App, HttpResponse, HttpServer, web};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::error::FramecastError;

/// Body returned for every accepted message.
pub const ACK: &str = "Received";

/// A command received on the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub timestamp: String,
    pub action: i64,
}

/// Listener address and route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub bind: String,
    /// `0` picks an ephemeral port.
    pub port: u16,
    pub path: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 4444,
            path: "/callback/".into(),
        }
    }
}

struct ControlState {
    messages: mpsc::UnboundedSender<ControlMessage>,
}

/// Handle for the control listener thread.
pub struct ControlServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ControlServer {
    /// Bind the listener and start serving on a dedicated thread.
    ///
    /// Bind failures are returned here; errors after that are logged
    /// by the listener thread.
    pub fn spawn(
        config: &ControlConfig,
        messages: mpsc::UnboundedSender<ControlMessage>,
    ) -> Result<Self, FramecastError> {
        let listener = TcpListener::bind((config.bind.as_str(), config.port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let path = config.path.clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = std::thread::Builder::new()
            .name("control-channel".into())
            .spawn(move || {
                if let Err(err) = actix_web::rt::System::new().block_on(async move {
                    let server = HttpServer::new(move || {
                        App::new()
                            .app_data(web::Data::new(ControlState {
                                messages: messages.clone(),
                            }))
                            .service(
                                web::resource(path.as_str())
                                    .route(web::post().to(control_handler)),
                            )
                    })
                    // One connection at a time, closed after each request.
                    .workers(1)
                    .max_connections(1)
                    .keep_alive(KeepAlive::Disabled)
                    .disable_signals()
                    .listen(listener)?
                    .run();

                    let srv_handle = server.handle();
                    actix_web::rt::spawn(async move {
                        let _ = shutdown_rx.await;
                        srv_handle.stop(true).await;
                    });

                    server.await
                }) {
                    error!("control channel error: {err}");
                }
            })?;

        info!(%local_addr, path = %config.path, "control channel listening");
        Ok(Self {
            local_addr,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signal the listener to stop and block until its thread exits.
    pub fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        info!("control channel stopped");
    }
}

async fn control_handler(body: web::Bytes, state: web::Data<ControlState>) -> HttpResponse {
    let message: ControlMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!("rejecting control message: {e}");
            return HttpResponse::BadRequest().body(e.to_string());
        }
    };

    info!(timestamp = %message.timestamp, action = message.action, "control message received");
    if state.messages.send(message).is_err() {
        warn!("control message dropped: no consumer");
    }
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(ACK)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> ControlConfig {
        ControlConfig {
            bind: "127.0.0.1".into(),
            port: 0,
            ..ControlConfig::default()
        }
    }

    #[test]
    fn message_json_shape() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"timestamp":"2024-01-01T00:00:00Z","action":1}"#).unwrap();
        assert_eq!(msg.action, 1);
        assert_eq!(msg.timestamp, "2024-01-01T00:00:00Z");

        assert!(serde_json::from_str::<ControlMessage>(r#"{"timestamp":"x"}"#).is_err());
        assert!(serde_json::from_str::<ControlMessage>(r#"{"timestamp":1,"action":1}"#).is_err());
    }

    #[test]
    fn default_route() {
        let config = ControlConfig::default();
        assert_eq!(config.port, 4444);
        assert_eq!(config.path, "/callback/");
    }

    #[tokio::test]
    async fn malformed_body_does_not_stop_listener() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let server = ControlServer::spawn(&local_config(), tx).unwrap();
        let url = format!("http://{}/callback/", server.local_addr());
        let client = reqwest::Client::new();

        let bad = client.post(&url).body("not json").send().await.unwrap();
        assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);

        let good = client
            .post(&url)
            .body(r#"{"timestamp":"t0","action":3}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(good.status(), reqwest::StatusCode::OK);
        assert_eq!(good.text().await.unwrap(), ACK);

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.action, 3);

        tokio::task::spawn_blocking(move || server.stop()).await.unwrap();
    }

    #[tokio::test]
    async fn other_methods_and_paths_are_client_errors() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let server = ControlServer::spawn(&local_config(), tx).unwrap();
        let base = format!("http://{}", server.local_addr());
        let client = reqwest::Client::new();

        let get = client.get(format!("{base}/callback/")).send().await.unwrap();
        assert!(get.status().is_client_error());
        let missing = client.post(format!("{base}/elsewhere")).send().await.unwrap();
        assert!(missing.status().is_client_error());

        tokio::task::spawn_blocking(move || server.stop()).await.unwrap();
    }
}
