//! Frame source adapter boundary.
//!
//! The native capture mechanism lives outside this crate. It is
//! plugged in through [`FrameSource`]: two commands, an owned copy of
//! the current pixel buffer, and lifecycle notifications delivered as
//! [`SourceEvent`]s on a channel that the capture pipeline consumes.
//!
//! [`SyntheticSource`] is a self-contained implementation producing a
//! test pattern, for hosts without a native adapter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::FramecastError;
use crate::frame::RawFrame;

// ── SourceEvent ──────────────────────────────────────────────────

/// Lifecycle notification emitted by a frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    CaptureStarted,
    PermissionDenied,
    NewFrameAvailable,
    CaptureStopped,
}

/// Sending half handed to a source. Unbounded so that a source calling
/// from a foreign thread never blocks.
pub type SourceEventSender = mpsc::UnboundedSender<SourceEvent>;
pub type SourceEventReceiver = mpsc::UnboundedReceiver<SourceEvent>;

// ── FrameSource ──────────────────────────────────────────────────

/// Adapter over a native screen-capture mechanism.
pub trait FrameSource: Send + Sync {
    /// Register the channel lifecycle events are sent on. Called once,
    /// before the first `request_capture`.
    fn attach(&self, events: SourceEventSender);

    /// Ask the source to start producing frames.
    fn request_capture(&self) -> Result<(), FramecastError>;

    /// Ask the source to stop producing frames.
    fn stop_capture(&self) -> Result<(), FramecastError>;

    /// Owned copy of the most recent frame, or `None` if the source has
    /// no buffer yet.
    fn current_frame(&self) -> Option<RawFrame>;
}

// ── SyntheticSource ──────────────────────────────────────────────

/// Test pattern drawn by [`SyntheticSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticPattern {
    /// A gradient that scrolls one pixel per frame.
    #[default]
    Gradient,
    /// A single fill colour (degenerate under every policy).
    Solid,
}

/// Frame source that renders a pattern on its own thread.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    interval: Duration,
    pattern: SyntheticPattern,
    deny_permission: bool,
    buffer: Arc<Mutex<Option<Vec<u8>>>>,
    events: Mutex<Option<SourceEventSender>>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: u32, pattern: SyntheticPattern) -> Self {
        Self {
            width,
            height,
            interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            pattern,
            deny_permission: false,
            buffer: Arc::new(Mutex::new(None)),
            events: Mutex::new(None),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Answer every capture request with `PermissionDenied`.
    pub fn with_permission_denied(mut self, deny: bool) -> Self {
        self.deny_permission = deny;
        self
    }

    fn emit(&self, event: SourceEvent) {
        if let Some(tx) = self.events.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            let _ = tx.send(event);
        }
    }

    fn render(pattern: SyntheticPattern, width: u32, height: u32, tick: u32, out: &mut [u8]) {
        let width = width.max(1);
        let height = height.max(1);
        for (i, px) in out.chunks_exact_mut(4).enumerate() {
            let x = i as u32 % width;
            let y = i as u32 / width;
            let rgba = match pattern {
                SyntheticPattern::Gradient => [
                    (x.wrapping_add(tick) % width * 255 / width) as u8,
                    (y * 255 / height) as u8,
                    (tick % 256) as u8,
                    255,
                ],
                SyntheticPattern::Solid => [16, 16, 16, 255],
            };
            px.copy_from_slice(&rgba);
        }
    }
}

impl FrameSource for SyntheticSource {
    fn attach(&self, events: SourceEventSender) {
        *self.events.lock().unwrap_or_else(|e| e.into_inner()) = Some(events);
    }

    fn request_capture(&self) -> Result<(), FramecastError> {
        if self.deny_permission {
            warn!("synthetic source: permission denied");
            self.emit(SourceEvent::PermissionDenied);
            return Ok(());
        }
        let events = self
            .events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(FramecastError::Other("frame source not attached".into()))?;
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("synthetic source already running");
            return Ok(());
        }
        let running = Arc::clone(&self.running);
        let buffer = Arc::clone(&self.buffer);
        let (width, height, interval, pattern) = (self.width, self.height, self.interval, self.pattern);

        let handle = std::thread::Builder::new()
            .name("synthetic-frame-source".into())
            .spawn(move || {
                let mut pixels = vec![0u8; RawFrame::expected_len(width, height)];
                let _ = events.send(SourceEvent::CaptureStarted);
                let mut tick: u32 = 0;
                while running.load(Ordering::SeqCst) {
                    Self::render(pattern, width, height, tick, &mut pixels);
                    // Overwrite the shared buffer in place, as a native source does.
                    buffer
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .get_or_insert_with(Vec::new)
                        .clone_from(&pixels);
                    if events.send(SourceEvent::NewFrameAvailable).is_err() {
                        break;
                    }
                    tick = tick.wrapping_add(1);
                    // Woken early by `stop_capture`.
                    std::thread::park_timeout(interval);
                }
                let _ = events.send(SourceEvent::CaptureStopped);
            })
            .inspect_err(|_| self.running.store(false, Ordering::SeqCst))?;

        info!(width, height, "synthetic source started");
        *self.worker.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        Ok(())
    }

    /// Blocks for at most one frame render, not a full frame interval.
    fn stop_capture(&self) -> Result<(), FramecastError> {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            handle.thread().unpark();
            handle
                .join()
                .map_err(|_| FramecastError::Other("synthetic source thread panicked".into()))?;
        }
        Ok(())
    }

    fn current_frame(&self) -> Option<RawFrame> {
        let data = self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()?;
        RawFrame::new(self.width, self.height, data).ok()
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        let _ = self.stop_capture();
    }
}

// ── Tests ────────────────────────────────────────────────────────
