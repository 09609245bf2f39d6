//! Capture agent service.
//!
//! Owns the capture pipeline and the optional control channel, and
//! drives them until the shutdown token is cancelled.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use framecast_core::{CapturePipeline, ControlMessage, ControlServer, FramecastError};

use crate::config::AgentConfig;

// ── AgentService ─────────────────────────────────────────────────

/// The top-level capture agent.
pub struct AgentService {
    config: AgentConfig,
    pipeline: Arc<CapturePipeline>,
}

impl AgentService {
    /// Build the source, sink and pipeline described by `config`.
    pub fn new(config: AgentConfig) -> Result<Self, FramecastError> {
        let sink = config.build_sink()?;
        let source = Arc::new(config.build_source());
        let pipeline = Arc::new(CapturePipeline::new(
            config.to_pipeline_config(),
            source,
            sink,
        ));
        Ok(Self { config, pipeline })
    }

    pub fn pipeline(&self) -> &Arc<CapturePipeline> {
        &self.pipeline
    }

    /// Token that stops [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.pipeline.shutdown_token()
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// 1. Starts the control channel, if enabled.
    /// 2. Requests capture, if `start_on_launch` is set.
    /// 3. Runs the pipeline loops.
    /// 4. Stops capture and the control channel on shutdown.
    pub async fn run(&self) -> Result<(), FramecastError> {
        let control = if self.config.control.enabled {
            let (tx, rx) = mpsc::unbounded_channel();
            let server = ControlServer::spawn(&self.config.control_config(), tx)?;
            tokio::spawn(Self::log_control_messages(rx, Arc::clone(&self.pipeline)));
            Some(server)
        } else {
            None
        };

        if self.config.capture.start_on_launch {
            if let Err(e) = self.pipeline.start() {
                warn!("capture not started: {e}");
            }
        }

        let result = self.pipeline.run().await;

        // Stopping may join a source thread; keep it off the runtime workers.
        let pipeline = Arc::clone(&self.pipeline);
        match tokio::task::spawn_blocking(move || pipeline.stop()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("error stopping capture: {e}"),
            Err(e) => error!("capture shutdown task failed: {e}"),
        }
        if let Some(server) = control {
            if let Err(e) = tokio::task::spawn_blocking(move || server.stop()).await {
                error!("control channel shutdown failed: {e}");
            }
        }

        info!(stats = %self.pipeline.stats(), "agent stopped");
        result
    }

    async fn log_control_messages(
        mut rx: mpsc::UnboundedReceiver<ControlMessage>,
        pipeline: Arc<CapturePipeline>,
    ) {
        while let Some(message) = rx.recv().await {
            debug!(
                action = message.action,
                timestamp = %message.timestamp,
                state = %pipeline.state(),
                "control signal"
            );
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
