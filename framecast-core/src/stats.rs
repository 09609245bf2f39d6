//! Lock-free pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the capture tick, drain loop and sends.
#[derive(Debug, Default)]
pub struct PipelineStats {
    captured: AtomicU64,
    degenerate: AtomicU64,
    unavailable: AtomicU64,
    encode_errors: AtomicU64,
    enqueued: AtomicU64,
    batches: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames encoded successfully.
    pub captured: u64,
    /// Frames skipped by the degenerate filter.
    pub degenerate: u64,
    /// Ticks skipped because the source had no buffer.
    pub unavailable: u64,
    pub encode_errors: u64,
    pub enqueued: u64,
    /// Frames dropped by queue eviction. Filled in by the pipeline,
    /// which owns the queue.
    pub evicted: u64,
    /// Batches assembled and handed to the sink.
    pub batches: u64,
    pub delivered: u64,
    pub failed: u64,
    /// Sends dropped because another was in flight.
    pub skipped: u64,
}

macro_rules! counter {
    ($($inc:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $inc(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    counter! {
        record_captured => captured,
        record_degenerate => degenerate,
        record_unavailable => unavailable,
        record_encode_error => encode_errors,
        record_enqueued => enqueued,
        record_batch => batches,
        record_delivered => delivered,
        record_failed => failed,
        record_skipped => skipped,
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            captured: self.captured.load(Ordering::Relaxed),
            degenerate: self.degenerate.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            evicted: 0,
            batches: self.batches.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "captured={} degenerate={} unavailable={} enqueued={} evicted={} batches={} delivered={} failed={} skipped={}",
            self.captured,
            self.degenerate,
            self.unavailable,
            self.enqueued,
            self.evicted,
            self.batches,
            self.delivered,
            self.failed,
            self.skipped,
        )
    }
}
