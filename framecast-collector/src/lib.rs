//! # framecast-collector
//!
//! Receiving end of the framecast wire protocol. Accepts POSTed frames
//! or length-prefixed batches, unbatches them into a bounded
//! drop-oldest queue and persists every frame to disk from a single
//! writer task.

pub mod config;
pub mod ingest;
pub mod server;
pub mod storage;
