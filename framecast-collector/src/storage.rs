//! Frame persistence.
//!
//! A single writer task drains the collector's frame queue and writes
//! each frame to its own file, named after the wall-clock time it was
//! written plus a sequence number.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Local};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use framecast_core::{Frame, FrameQueue, FramecastError, sniff_extension, timestamped_file_name};

// ── FrameStore ───────────────────────────────────────────────────

/// Directory that received frames are written into.
pub struct FrameStore {
    dir: PathBuf,
    sequence: AtomicU64,
}

impl FrameStore {
    /// Open `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FramecastError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `frame_<YYYYmmdd_HHMMSS_ffffff>_<seq>.<ext>`
    fn file_name(&self, payload: &[u8], now: DateTime<Local>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        timestamped_file_name("frame", now, seq, sniff_extension(payload))
    }

    /// Write one frame and return its path.
    pub async fn save(&self, frame: &Frame) -> Result<PathBuf, FramecastError> {
        let path = self.dir.join(self.file_name(frame.as_bytes(), Local::now()));
        tokio::fs::write(&path, frame.as_bytes()).await?;
        debug!(bytes = frame.len(), path = %path.display(), "frame saved");
        Ok(path)
    }
}

// ── Writer ───────────────────────────────────────────────────────

/// Persist frames from `queue` until `shutdown` is cancelled, then
/// flush whatever is still queued. Returns the number of frames saved.
pub async fn run_writer(
    queue: Arc<FrameQueue>,
    store: FrameStore,
    shutdown: CancellationToken,
) -> u64 {
    info!(dir = %store.dir().display(), "frame writer started");
    let mut saved = 0u64;

    loop {
        let frames = tokio::select! {
            _ = shutdown.cancelled() => break,
            frames = queue.dequeue_batch(1) => frames,
        };
        for frame in &frames {
            saved += write_one(&store, frame).await;
        }
    }

    while let Some(frames) = queue.try_dequeue_batch(1) {
        for frame in &frames {
            saved += write_one(&store, frame).await;
        }
    }

    info!(saved, "frame writer stopped");
    saved
}

async fn write_one(store: &FrameStore, frame: &Frame) -> u64 {
    match store.save(frame).await {
        Ok(_) => 1,
        Err(e) => {
            warn!("error saving frame: {e}");
            0
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
