//! Degenerate-frame detection.
//!
//! A frame is degenerate when its pixels carry no useful information:
//! a blank screen, a single fill colour, or a frame that was never
//! written. Such frames are skipped before encoding.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::frame::BYTES_PER_PIXEL;

/// Policy deciding which pixel buffers count as degenerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegeneratePolicy {
    /// Degenerate when at most two distinct RGBA values appear.
    #[default]
    TwoColor,
    /// Degenerate only when every byte equals the first byte.
    StrictUniform,
}

impl DegeneratePolicy {
    /// Returns `true` if `pixels` should be skipped.
    ///
    /// Empty buffers are always degenerate. Under [`TwoColor`] a
    /// trailing partial pixel is ignored.
    ///
    /// [`TwoColor`]: DegeneratePolicy::TwoColor
    pub fn is_degenerate(self, pixels: &[u8]) -> bool {
        if pixels.is_empty() {
            return true;
        }
        match self {
            Self::TwoColor => has_at_most_two_colors(pixels),
            Self::StrictUniform => is_uniform(pixels),
        }
    }
}

fn has_at_most_two_colors(pixels: &[u8]) -> bool {
    let mut distinct = HashSet::with_capacity(3);
    for px in pixels.chunks_exact(BYTES_PER_PIXEL) {
        distinct.insert(u32::from_ne_bytes([px[0], px[1], px[2], px[3]]));
        if distinct.len() > 2 {
            return false;
        }
    }
    true
}

fn is_uniform(pixels: &[u8]) -> bool {
    let first = pixels[0];
    pixels.iter().all(|&b| b == first)
}

// ── Tests ────────────────────────────────────────────────────────
