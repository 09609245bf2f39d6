//! # framecast-core
//!
//! Screen-frame streaming pipeline: frames sampled from an external
//! capture source are filtered, encoded, buffered under a bounded
//! drop-oldest queue and shipped to a remote collector.
//!
//! This crate contains:
//! - **Frames**: `RawFrame` pixel buffers and encoded `Frame` payloads
//! - **Filter**: `DegeneratePolicy` for skipping uniform frames
//! - **Encoder**: `FrameEncoder` (raw, JPEG, zstd)
//! - **Queue**: `FrameQueue`, bounded with drop-oldest eviction
//! - **Batch**: the length-prefixed big-endian batch wire format
//! - **Sink**: `HttpSender` and `FileSink` behind a single-flight guard
//! - **Source**: the `FrameSource` adapter boundary and `SyntheticSource`
//! - **Pipeline**: `CapturePipeline`, the cadence, drain and lifecycle loops
//! - **Control**: `ControlServer`, the inbound JSON command listener
//! - **Error**: `FramecastError`, a typed `thiserror` hierarchy

pub mod batch;
pub mod cadence;
pub mod control;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod frame;
pub mod pipeline;
pub mod queue;
pub mod sink;
pub mod source;
pub mod state;
pub mod stats;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use batch::{Batch, BatchReader, parse_batch};
pub use cadence::TickAccumulator;
pub use control::{ACK, ControlConfig, ControlMessage, ControlServer};
pub use encoder::{DEFAULT_JPEG_QUALITY, EncoderMode, FrameEncoder};
pub use error::FramecastError;
pub use filter::DegeneratePolicy;
pub use frame::{BYTES_PER_PIXEL, Frame, RawFrame};
pub use pipeline::{CapturePipeline, CycleOutcome, DeliveryMode, PipelineConfig};
pub use queue::{EnqueueOutcome, FrameQueue};
pub use sink::{
    Endpoint, FileSink, FrameSink, HttpSender, SendOutcome, SingleFlight, TrustMode,
    sniff_extension, timestamped_file_name,
};
pub use source::{
    FrameSource, SourceEvent, SourceEventReceiver, SourceEventSender, SyntheticPattern,
    SyntheticSource,
};
pub use state::CaptureState;
pub use stats::{PipelineStats, StatsSnapshot};
