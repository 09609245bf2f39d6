//! # framecast-agent: screen capture agent
//!
//! Samples frames from the capture source at a fixed cadence, drops
//! degenerate ones, encodes the rest and streams them to the remote
//! collector, either one by one or in length-prefixed batches.
//!
//! Also runs the inbound control channel, a small JSON listener for
//! out-of-band signals.

pub mod config;
pub mod service;
