//! Frame types shared across the pipeline stages.
//!
//! [`RawFrame`] is the owned copy of the capture source's pixel buffer,
//! taken before the source overwrites it. [`Frame`] is the encoded,
//! immutable payload that travels through the queue and onto the wire.

use std::time::Instant;

use bytes::Bytes;

use crate::error::FramecastError;

/// Bytes per RGBA8888 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

// ── RawFrame ─────────────────────────────────────────────────────

/// An uncompressed RGBA8888 frame copied out of the capture source.
///
/// `data` holds `height` tightly packed rows of `width * 4` bytes.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel data, `width * height * 4` bytes.
    pub data: Vec<u8>,
    /// Monotonic capture timestamp.
    pub timestamp: Instant,
}

impl RawFrame {
    /// Wrap a pixel buffer, checking it against the declared size.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, FramecastError> {
        let expected = Self::expected_len(width, height);
        if data.len() != expected {
            return Err(FramecastError::InvalidFrame {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
            timestamp: Instant::now(),
        })
    }

    /// Buffer size a `width × height` RGBA8888 frame occupies.
    pub const fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Length of one row in bytes.
    pub fn row_len(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Returns a row slice.
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.row_len();
        &self.data[start..start + self.row_len()]
    }

    /// Mirror the frame top-to-bottom in place.
    ///
    /// Capture sources backed by GPU textures often deliver rows
    /// bottom-up.
    pub fn flip_vertical(&mut self) {
        let row_len = self.row_len();
        let rows = self.height as usize;
        for y in 0..rows / 2 {
            let (top, bottom) = self.data.split_at_mut((rows - 1 - y) * row_len);
            top[y * row_len..(y + 1) * row_len].swap_with_slice(&mut bottom[..row_len]);
        }
    }
}

// ── Frame ────────────────────────────────────────────────────────

/// One encoded frame payload.
///
/// Cloning is cheap (reference counted); the bytes never change after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    data: Bytes,
}

impl Frame {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

// ── Tests ────────────────────────────────────────────────────────
