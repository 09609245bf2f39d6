//! Bounded frame queue with drop-oldest eviction.
//!
//! The capture tick pushes encoded frames in; the drain loop pulls
//! fixed-size batches out. Pushing never blocks on the consumer: when
//! the queue is full the oldest frame is evicted to make room.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::frame::Frame;

/// Result of a single [`FrameQueue::enqueue`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The frame was stored; `evicted` older frames were dropped first.
    Queued { evicted: usize },
    /// Zero-length frames are not stored.
    RejectedEmpty,
}

/// Fixed-capacity FIFO of encoded frames.
///
/// All operations take a short internal lock, so `enqueue` and
/// `try_dequeue_batch` are atomic with respect to each other.
pub struct FrameQueue {
    frames: Mutex<VecDeque<Frame>>,
    capacity: usize,
    /// Total frames evicted since construction.
    evicted: AtomicU64,
    available: Notify,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
            evicted: AtomicU64::new(0),
            available: Notify::new(),
        }
    }

    /// Capacity sized to hold `retention_seconds` of capture at `fps`.
    pub fn with_retention(fps: u32, retention_seconds: u32) -> Self {
        Self::new(fps as usize * retention_seconds as usize)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total number of frames dropped by eviction.
    pub fn evicted_count(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Append a frame, evicting from the front while at capacity.
    pub fn enqueue(&self, frame: Frame) -> EnqueueOutcome {
        if frame.is_empty() {
            warn!("skipping frame: payload is empty");
            return EnqueueOutcome::RejectedEmpty;
        }

        let (evicted, len) = {
            let mut frames = self.lock();
            let mut evicted = 0;
            while frames.len() >= self.capacity {
                frames.pop_front();
                evicted += 1;
            }
            frames.push_back(frame);
            (evicted, frames.len())
        };

        if evicted > 0 {
            self.evicted.fetch_add(evicted as u64, Ordering::Relaxed);
            warn!(evicted, "dropping oldest frame(s): queue at capacity");
        }
        debug!(len, "frame enqueued");
        self.available.notify_waiters();
        EnqueueOutcome::Queued { evicted }
    }

    /// Remove and return the `n` oldest frames, or `None` (removing
    /// nothing) when fewer than `n` are queued or `n` is zero.
    pub fn try_dequeue_batch(&self, n: usize) -> Option<Vec<Frame>> {
        if n == 0 {
            return None;
        }
        let mut frames = self.lock();
        if frames.len() < n {
            return None;
        }
        Some(frames.drain(..n).collect())
    }

    /// Wait until `n` frames are queued, then remove and return them.
    ///
    /// A zero-sized request returns an empty batch immediately.
    pub async fn dequeue_batch(&self, n: usize) -> Vec<Frame> {
        if n == 0 {
            return Vec::new();
        }
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            // Register before checking so an enqueue in between is not missed.
            notified.as_mut().enable();

            if let Some(batch) = self.try_dequeue_batch(n) {
                return batch;
            }
            notified.await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Frame>> {
        // A panic while holding the lock cannot leave the deque
        // half-modified, so poisoning is ignored.
        self.frames.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── Tests ────────────────────────────────────────────────────────
