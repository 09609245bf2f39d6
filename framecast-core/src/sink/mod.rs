//! Payload sinks: where encoded frames and batches end up.
//!
//! | Sink         | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `HttpSender` | HTTP(S) POST to the remote collector            |
//! | `FileSink`   | Persist payloads to a local directory           |
//!
//! Every sink is single-flight: while one transfer is active, further
//! requests are dropped with [`SendOutcome::Skipped`] instead of being
//! queued or retried.

pub mod file;
pub mod http;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;

pub use file::{FileSink, sniff_extension, timestamped_file_name};
pub use http::{Endpoint, HttpSender, TrustMode};

// ── SendOutcome ──────────────────────────────────────────────────

/// Result of handing one payload to a sink.
///
/// Delivery failures are reported here rather than as errors: the
/// caller logs them and moves on to the next payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The payload reached its destination.
    Delivered { bytes: usize },
    /// Another transfer was in flight; the payload was discarded.
    Skipped,
    /// The transfer failed; the payload was discarded.
    Failed(String),
}

impl SendOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

impl fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered { bytes } => write!(f, "delivered {bytes} bytes"),
            Self::Skipped => write!(f, "skipped (transfer in flight)"),
            Self::Failed(cause) => write!(f, "failed: {cause}"),
        }
    }
}

// ── FrameSink ────────────────────────────────────────────────────

/// Destination for frame and batch payloads.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Deliver one payload. Never fails across this boundary.
    async fn send(&self, payload: Bytes) -> SendOutcome;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

// ── SingleFlight ─────────────────────────────────────────────────

/// Atomic in-flight flag admitting at most one active transfer.
#[derive(Debug, Default)]
pub struct SingleFlight {
    in_flight: AtomicBool,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot. Returns `None`, leaving the flag untouched, if a
    /// transfer is already active.
    pub fn try_begin(&self) -> Option<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard { flight: self })
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Releases the [`SingleFlight`] slot when dropped, including on early
/// return, panic, or cancellation of the owning future.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    flight: &'a SingleFlight,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flight.in_flight.store(false, Ordering::Release);
    }
}

// ── Tests ────────────────────────────────────────────────────────
