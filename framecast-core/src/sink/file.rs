//! Local persistent sink.
//!
//! Writes every payload to its own file under an output directory. Names
//! carry the local wall-clock time and a per-sink sequence number, so
//! runs sharing a directory never collide; files are opened with
//! `create_new` and an existing file is never overwritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::FramecastError;
use crate::sink::{FrameSink, SendOutcome, SingleFlight};

/// Fresh names tried before a write gives up on collisions.
const NAME_ATTEMPTS: usize = 4;

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];

/// File extension for an encoded frame, judged from its leading bytes.
pub fn sniff_extension(payload: &[u8]) -> &'static str {
    if payload.starts_with(JPEG_MAGIC) {
        "jpg"
    } else if payload.starts_with(ZSTD_MAGIC) {
        "zst"
    } else {
        "rgba"
    }
}

/// `<prefix>_<YYYYmmdd_HHMMSS_ffffff>_<seq>.<ext>`
pub fn timestamped_file_name(prefix: &str, now: DateTime<Local>, seq: u64, ext: &str) -> String {
    format!("{prefix}_{}_{seq:06}.{ext}", now.format("%Y%m%d_%H%M%S_%6f"))
}

/// Single-flight sink persisting payloads to disk.
pub struct FileSink {
    dir: PathBuf,
    sequence: AtomicU64,
    batched: bool,
    flight: SingleFlight,
}

impl FileSink {
    /// Create the sink, creating `dir` if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, FramecastError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            sequence: AtomicU64::new(0),
            batched: false,
            flight: SingleFlight::new(),
        })
    }

    /// Payloads are batch bodies rather than single frames; they are
    /// stored as `batch_*.bin`.
    pub fn with_batches(mut self, batched: bool) -> Self {
        self.batched = batched;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(&self, payload: &[u8], now: DateTime<Local>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        if self.batched {
            timestamped_file_name("batch", now, seq, "bin")
        } else {
            timestamped_file_name("frame", now, seq, sniff_extension(payload))
        }
    }

    async fn write_new(path: &Path, payload: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(payload).await?;
        file.flush().await
    }
}

#[async_trait]
impl FrameSink for FileSink {
    async fn send(&self, payload: Bytes) -> SendOutcome {
        let Some(_guard) = self.flight.try_begin() else {
            debug!("write already in flight; dropping payload");
            return SendOutcome::Skipped;
        };

        let bytes = payload.len();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let path = self.dir.join(self.file_name(&payload, Local::now()));
            match Self::write_new(&path, &payload).await {
                Ok(()) => {
                    debug!(bytes, path = %path.display(), "payload written");
                    return SendOutcome::Delivered { bytes };
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < NAME_ATTEMPTS => {
                    debug!(path = %path.display(), "name taken; retrying");
                }
                Err(e) => {
                    warn!("error writing {}: {e}", path.display());
                    return SendOutcome::Failed(e.to_string());
                }
            }
        }
    }

    fn describe(&self) -> String {
        format!("file sink → {}", self.dir.display())
    }
}

// ── Tests ────────────────────────────────────────────────────────
