//! Capture pipeline orchestrator.
//!
//! Ties the stages together:
//!
//! 1. [`FrameSource`] supplies raw frames and lifecycle events.
//! 2. [`DegeneratePolicy`] rejects uninformative frames.
//! 3. [`FrameEncoder`] turns the frame into a payload.
//! 4. In batch mode the payload goes into the [`FrameQueue`] and a
//!    separate drain loop ships fixed-size [`Batch`]es; in immediate
//!    mode it is handed straight to the [`FrameSink`].
//!
//! [`run`](CapturePipeline::run) drives three concurrent activities
//! (lifecycle events, cadence ticks, batch drain) that share only the
//! queue and the sink's in-flight flag. None of them waits on network
//! I/O from the cadence tick, and encoding runs on the blocking pool so
//! the other two keep being polled while a frame is compressed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::OptionFuture;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::batch::Batch;
use crate::cadence::TickAccumulator;
use crate::encoder::{EncoderMode, FrameEncoder};
use crate::error::FramecastError;
use crate::filter::DegeneratePolicy;
use crate::frame::{Frame, RawFrame};
use crate::queue::{EnqueueOutcome, FrameQueue};
use crate::sink::{FrameSink, SendOutcome};
use crate::source::{FrameSource, SourceEvent, SourceEventReceiver};
use crate::state::CaptureState;
use crate::stats::{PipelineStats, StatsSnapshot};

/// Cadence ticks are checked this many times per capture interval.
const TICK_RESOLUTION: u32 = 4;

// ── DeliveryMode ─────────────────────────────────────────────────

/// How encoded frames reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "delivery", rename_all = "snake_case")]
pub enum DeliveryMode {
    /// One send per captured frame.
    Immediate,
    /// Queue frames and send them `batch_size` at a time.
    Batch { batch_size: usize },
}

// ── PipelineConfig ───────────────────────────────────────────────

/// Configuration for [`CapturePipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Target capture rate in frames per second.
    pub fps: u32,
    /// Seconds of capture the queue retains (`fps × retention_seconds` frames).
    pub retention_seconds: u32,
    pub delivery: DeliveryMode,
    pub policy: DegeneratePolicy,
    pub encoder: EncoderMode,
    /// Mirror frames top-to-bottom before encoding.
    pub flip_vertical: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fps: 30,
            retention_seconds: 60,
            delivery: DeliveryMode::Batch { batch_size: 60 },
            policy: DegeneratePolicy::default(),
            encoder: EncoderMode::default(),
            flip_vertical: false,
        }
    }
}

// ── CycleOutcome ─────────────────────────────────────────────────

/// What a single capture cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Not capturing; nothing sampled.
    Inactive,
    /// The source has no frame buffer yet.
    Unavailable,
    /// The frame was rejected by the degenerate filter.
    Degenerate,
    /// Encoding failed; the frame was dropped.
    EncodeFailed,
    /// Queued for batching, after evicting `evicted` old frames.
    Queued { evicted: usize },
    /// Handed to the sink on its own task.
    Dispatched,
    /// Immediate mode with no Tokio runtime to send on; the frame was dropped.
    Undeliverable,
}

// ── CapturePipeline ──────────────────────────────────────────────

/// The assembled capture → filter → encode → deliver pipeline.
///
/// Construct once and share behind an `Arc`; `start`, `stop` and the
/// accessors may be called from any task while [`run`](Self::run) is
/// active. [`capture_once`](Self::capture_once) may also be called from
/// a thread outside the runtime: immediate-mode sends go through the
/// runtime handle captured at construction (or set with
/// [`with_runtime`](Self::with_runtime)).
pub struct CapturePipeline {
    config: PipelineConfig,
    source: Arc<dyn FrameSource>,
    sink: Arc<dyn FrameSink>,
    encoder: FrameEncoder,
    queue: Arc<FrameQueue>,
    state: Mutex<CaptureState>,
    /// A capture request is outstanding with the source. Only read or
    /// written with `state` locked.
    requested: AtomicBool,
    stats: Arc<PipelineStats>,
    runtime: Option<Handle>,
    events: Mutex<Option<SourceEventReceiver>>,
    shutdown: CancellationToken,
}

impl CapturePipeline {
    /// Build the pipeline and attach it to `source`'s event stream.
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn FrameSource>,
        sink: Arc<dyn FrameSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        source.attach(events_tx);

        let encoder = FrameEncoder::new(config.encoder).with_flip_vertical(config.flip_vertical);
        let queue = Arc::new(FrameQueue::with_retention(config.fps, config.retention_seconds));

        Self {
            config,
            source,
            sink,
            encoder,
            queue,
            state: Mutex::new(CaptureState::default()),
            requested: AtomicBool::new(false),
            stats: Arc::new(PipelineStats::new()),
            runtime: Handle::try_current().ok(),
            events: Mutex::new(Some(events_rx)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Spawn immediate-mode sends on `handle` instead of the runtime the
    /// pipeline was built in.
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CaptureState {
        self.lock_state().clone()
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            evicted: self.queue.evicted_count(),
            ..self.stats.snapshot()
        }
    }

    /// Token that ends [`run`](Self::run) when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ask the source to begin capturing. Capture is active once the
    /// source confirms with [`SourceEvent::CaptureStarted`].
    pub fn start(&self) -> Result<(), FramecastError> {
        {
            let state = self.lock_state();
            if state.is_capturing() {
                debug!("start ignored: already capturing");
                return Ok(());
            }
            if !state.can_start() {
                return Err(FramecastError::InvalidTransition(
                    "cannot start: capture permission was denied",
                ));
            }
            self.requested.store(true, Ordering::SeqCst);
        }
        info!("requesting screen capture");
        self.source.request_capture()
    }

    /// Stop capturing. Calling it again is a no-op.
    ///
    /// Transfers already in flight are left to finish on their own.
    pub fn stop(&self) -> Result<(), FramecastError> {
        let (changed, pending) = {
            let mut state = self.lock_state();
            (state.stop(), self.requested.swap(false, Ordering::SeqCst))
        };
        if !changed && !pending {
            return Ok(());
        }
        info!("stopping screen capture");
        self.source.stop_capture()
    }

    /// External restart after a permission denial.
    pub fn reset(&self) {
        self.lock_state().reset();
    }

    /// Apply one lifecycle notification to the state machine.
    ///
    /// Notifications that do not fit the current state are ignored. A
    /// start confirmation with no outstanding request (one that arrives
    /// after [`stop`](Self::stop), say) is refused and the source is
    /// told to stop again.
    pub fn handle_event(&self, event: SourceEvent) {
        let mut state = self.lock_state();
        let result = match event {
            SourceEvent::CaptureStarted if !self.requested.load(Ordering::SeqCst) => {
                drop(state);
                debug!("ignoring {event:?}: no capture was requested");
                if let Err(e) = self.source.stop_capture() {
                    warn!("error stopping unrequested capture: {e}");
                }
                return;
            }
            SourceEvent::CaptureStarted => state.capture_started(),
            SourceEvent::PermissionDenied => state.permission_denied(),
            SourceEvent::CaptureStopped => state.source_stopped(),
            SourceEvent::NewFrameAvailable => {
                trace!("new frame available");
                return;
            }
        };
        match result {
            Ok(()) => {
                if !state.is_capturing() {
                    self.requested.store(false, Ordering::SeqCst);
                }
                info!(state = %*state, "capture state changed on {event:?}");
            }
            Err(e) => debug!("ignoring {event:?}: {e}"),
        }
    }

    /// Run one capture cycle: sample, filter, encode and route.
    ///
    /// Encodes on the calling thread. The cadence loop inside
    /// [`run`](Self::run) encodes on the blocking pool instead.
    pub fn capture_once(&self) -> CycleOutcome {
        match self.sample() {
            Ok(raw) => self.route(self.encoder.encode(raw)),
            Err(outcome) => outcome,
        }
    }

    async fn capture_cycle(&self) -> CycleOutcome {
        let raw = match self.sample() {
            Ok(raw) => raw,
            Err(outcome) => return outcome,
        };
        let encoder = self.encoder.clone();
        let encoded = tokio::task::spawn_blocking(move || encoder.encode(raw))
            .await
            .unwrap_or_else(|e| Err(FramecastError::Other(format!("encoder task failed: {e}"))));
        self.route(encoded)
    }

    /// Copy the current frame if capturing and the frame is informative.
    fn sample(&self) -> Result<RawFrame, CycleOutcome> {
        if !self.state().is_capturing() {
            return Err(CycleOutcome::Inactive);
        }

        let Some(raw) = self.source.current_frame() else {
            debug!("skipping cycle: source has no frame buffer");
            self.stats.record_unavailable();
            return Err(CycleOutcome::Unavailable);
        };

        if self.config.policy.is_degenerate(&raw.data) {
            debug!("skipping frame: image data is uniform");
            self.stats.record_degenerate();
            return Err(CycleOutcome::Degenerate);
        }
        Ok(raw)
    }

    fn route(&self, encoded: Result<Frame, FramecastError>) -> CycleOutcome {
        let frame = match encoded {
            Ok(frame) => frame,
            Err(e) => {
                warn!("dropping frame: {e}");
                self.stats.record_encode_error();
                return CycleOutcome::EncodeFailed;
            }
        };
        self.stats.record_captured();

        match self.config.delivery {
            DeliveryMode::Batch { .. } => match self.queue.enqueue(frame) {
                EnqueueOutcome::Queued { evicted } => {
                    self.stats.record_enqueued();
                    CycleOutcome::Queued { evicted }
                }
                EnqueueOutcome::RejectedEmpty => CycleOutcome::EncodeFailed,
            },
            DeliveryMode::Immediate => {
                let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok())
                else {
                    warn!("dropping frame: no async runtime to send it on");
                    self.stats.record_failed();
                    return CycleOutcome::Undeliverable;
                };
                let sink = Arc::clone(&self.sink);
                let stats = Arc::clone(&self.stats);
                runtime.spawn(async move {
                    let outcome = sink.send(frame.into_bytes()).await;
                    record_outcome(&stats, &outcome);
                });
                CycleOutcome::Dispatched
            }
        }
    }

    /// Drive the pipeline until the shutdown token is cancelled.
    ///
    /// Can only be called once per pipeline.
    pub async fn run(&self) -> Result<(), FramecastError> {
        let events = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| FramecastError::Other("pipeline is already running".into()))?;

        info!(
            fps = self.config.fps,
            queue_capacity = self.queue.capacity(),
            sink = %self.sink.describe(),
            "capture pipeline running"
        );

        let drain: OptionFuture<_> = match self.config.delivery {
            DeliveryMode::Batch { batch_size } => Some(self.drain_loop(batch_size.max(1))),
            DeliveryMode::Immediate => None,
        }
        .into();

        tokio::join!(self.event_loop(events), self.cadence_loop(), drain);

        info!(stats = %self.stats(), "capture pipeline stopped");
        Ok(())
    }

    // ── Internal loops ───────────────────────────────────────────

    async fn event_loop(&self, mut events: SourceEventReceiver) {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        debug!("frame source dropped its event channel");
                        break;
                    }
                },
            };
            self.handle_event(event);
        }
    }

    async fn cadence_loop(&self) {
        let mut ticker = TickAccumulator::from_fps(self.config.fps);
        let mut interval = tokio::time::interval(tick_period(self.config.fps));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            let now = Instant::now();
            let elapsed = now.duration_since(last);
            last = now;

            if !self.state().is_capturing() {
                ticker.reset();
                continue;
            }
            if ticker.advance(elapsed) {
                self.capture_cycle().await;
            }
        }
    }

    async fn drain_loop(&self, batch_size: usize) {
        loop {
            let frames = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                frames = self.queue.dequeue_batch(batch_size) => frames,
            };

            let batch = match Batch::assemble(&frames) {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("dropping batch: {e}");
                    continue;
                }
            };
            self.stats.record_batch();
            debug!(frames = batch.frame_count(), bytes = batch.len(), "sending batch");

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                outcome = self.sink.send(batch.into_bytes()) => record_outcome(&self.stats, &outcome),
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CaptureState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn record_outcome(stats: &PipelineStats, outcome: &SendOutcome) {
    match outcome {
        SendOutcome::Delivered { .. } => stats.record_delivered(),
        SendOutcome::Skipped => stats.record_skipped(),
        SendOutcome::Failed(_) => stats.record_failed(),
    }
}

/// Time between cadence checks for a given capture rate.
pub fn tick_period(fps: u32) -> Duration {
    TickAccumulator::from_fps(fps).interval() / TICK_RESOLUTION
}

// ── Tests ────────────────────────────────────────────────────────
