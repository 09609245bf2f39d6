//! Capture lifecycle state machine.
//!
//! Models the lifecycle of the capture source as seen by the pipeline,
//! with validated transitions that return `Result` instead of
//! panicking.

use std::time::Instant;

use crate::error::FramecastError;

// ── CaptureState ─────────────────────────────────────────────────

/// The current lifecycle phase of capture.
///
/// ```text
///                 CaptureStarted               source stopped
///  Idle ──────────────────────────► Capturing ───────────────► Stopped
///   │  ▲                                 │                        │
///   │  └──────────── stop() ─────────────┘                        │
///   │  ▲──────────────────── CaptureStarted ──────────────────────┘
///   │
///   └── PermissionDenied ──► PermissionDenied  (until reset())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// Not capturing. Initial state.
    #[default]
    Idle,

    /// Frames are being sampled on every cadence tick.
    Capturing {
        /// When capture began.
        since: Instant,
    },

    /// The source ended capture on its own.
    Stopped,

    /// The user refused capture. Terminal until an external reset.
    PermissionDenied,
}

impl std::fmt::Display for CaptureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Capturing { .. } => write!(f, "Capturing"),
            Self::Stopped => write!(f, "Stopped"),
            Self::PermissionDenied => write!(f, "PermissionDenied"),
        }
    }
}

impl CaptureState {
    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    /// Whether `start()` may issue a capture request from here.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped)
    }

    /// How long capture has been running. `None` unless capturing.
    pub fn capturing_duration(&self) -> Option<std::time::Duration> {
        match self {
            Self::Capturing { since } => Some(since.elapsed()),
            _ => None,
        }
    }

    // ── Transitions ──────────────────────────────────────────────

    /// The source reported that capture began.
    ///
    /// Valid from: `Idle`, `Stopped`.
    pub fn capture_started(&mut self) -> Result<(), FramecastError> {
        match self {
            Self::Idle | Self::Stopped => {
                *self = Self::Capturing {
                    since: Instant::now(),
                };
                Ok(())
            }
            _ => Err(FramecastError::InvalidTransition(
                "cannot start capturing: not in Idle or Stopped state",
            )),
        }
    }

    /// The source reported that permission was refused.
    ///
    /// Valid from: `Idle`.
    pub fn permission_denied(&mut self) -> Result<(), FramecastError> {
        match self {
            Self::Idle => {
                *self = Self::PermissionDenied;
                Ok(())
            }
            _ => Err(FramecastError::InvalidTransition(
                "cannot deny permission: not in Idle state",
            )),
        }
    }

    /// The source ended capture on its own.
    ///
    /// Valid from: `Capturing`.
    pub fn source_stopped(&mut self) -> Result<(), FramecastError> {
        match self {
            Self::Capturing { .. } => {
                *self = Self::Stopped;
                Ok(())
            }
            _ => Err(FramecastError::InvalidTransition(
                "cannot mark stopped: not in Capturing state",
            )),
        }
    }

    /// Stop capturing. Idempotent; returns `true` if the state changed.
    ///
    /// `PermissionDenied` is left as is.
    pub fn stop(&mut self) -> bool {
        match self {
            Self::Capturing { .. } | Self::Stopped => {
                *self = Self::Idle;
                true
            }
            Self::Idle | Self::PermissionDenied => false,
        }
    }

    /// External restart: force back to `Idle` from any state.
    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}

// ── Tests ────────────────────────────────────────────────────────
