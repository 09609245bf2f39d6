//! Frame encoder.
//!
//! Converts a [`RawFrame`] into the [`Frame`] payload that goes on the
//! wire. The mode is fixed at construction:
//!
//! - **Raw**: the RGBA bytes unchanged.
//! - **Jpeg**: lossy JPEG at a fixed quality (alpha dropped).
//! - **Zstd**: lossless zstd compression of the RGBA bytes.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::FramecastError;
use crate::frame::{Frame, RawFrame};

/// JPEG quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 50;

// ── EncoderMode ──────────────────────────────────────────────────

/// How raw frames are turned into payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EncoderMode {
    Raw,
    Jpeg { quality: u8 },
    Zstd { level: i32 },
}

impl Default for EncoderMode {
    fn default() -> Self {
        Self::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

// ── FrameEncoder ─────────────────────────────────────────────────

/// Stateless-per-call frame encoder with a fixed [`EncoderMode`].
#[derive(Debug, Clone)]
pub struct FrameEncoder {
    mode: EncoderMode,
    flip_vertical: bool,
}

impl FrameEncoder {
    pub fn new(mode: EncoderMode) -> Self {
        Self {
            mode,
            flip_vertical: false,
        }
    }

    /// Mirror frames top-to-bottom before encoding.
    pub fn with_flip_vertical(mut self, flip: bool) -> Self {
        self.flip_vertical = flip;
        self
    }

    pub fn mode(&self) -> EncoderMode {
        self.mode
    }

    /// Encode one frame. Takes ownership so the raw buffer can be
    /// reused for flipping and handed to the image encoder without a
    /// further copy.
    pub fn encode(&self, mut raw: RawFrame) -> Result<Frame, FramecastError> {
        if self.flip_vertical {
            raw.flip_vertical();
        }

        match self.mode {
            EncoderMode::Raw => Ok(Frame::new(raw.data)),
            EncoderMode::Jpeg { quality } => Self::encode_jpeg(raw, quality),
            EncoderMode::Zstd { level } => {
                let compressed = zstd::encode_all(raw.data.as_slice(), level)
                    .map_err(|e| FramecastError::Encoding(format!("zstd encode failed: {e}")))?;
                Ok(Frame::new(compressed))
            }
        }
    }

    fn encode_jpeg(raw: RawFrame, quality: u8) -> Result<Frame, FramecastError> {
        let (width, height, actual) = (raw.width, raw.height, raw.data.len());
        let rgba = RgbaImage::from_raw(width, height, raw.data).ok_or(
            FramecastError::InvalidFrame {
                expected: RawFrame::expected_len(width, height),
                actual,
            },
        )?;
        let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

        let mut buffer = Vec::new();
        JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
            .encode_image(&rgb)
            .map_err(|e| FramecastError::Encoding(format!("JPEG encode failed: {e}")))?;
        Ok(Frame::new(buffer))
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(w: u32, h: u32) -> RawFrame {
        let mut data = Vec::with_capacity(RawFrame::expected_len(w, h));
        for y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[x as u8, y as u8, (x ^ y) as u8, 255]);
            }
        }
        RawFrame::new(w, h, data).unwrap()
    }

    #[test]
    fn raw_mode_passes_bytes_through() {
        let frame = gradient(8, 8);
        let expected = frame.data.clone();
        let out = FrameEncoder::new(EncoderMode::Raw).encode(frame).unwrap();
        assert_eq!(out.as_bytes(), expected.as_slice());
    }

    #[test]
    fn jpeg_mode_emits_jpeg() {
        let out = FrameEncoder::new(EncoderMode::default())
            .encode(gradient(32, 32))
            .unwrap();
        // SOI marker.
        assert_eq!(&out.as_bytes()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn zstd_mode_is_lossless() {
        let frame = gradient(16, 16);
        let expected = frame.data.clone();
        let out = FrameEncoder::new(EncoderMode::Zstd { level: 3 })
            .encode(frame)
            .unwrap();
        let decoded = zstd::decode_all(out.as_bytes()).unwrap();
        assert_eq!(decoded, expected);
    }

    #[test]
    fn flip_applies_before_encoding() {
        let frame = gradient(2, 2);
        let mut flipped = frame.clone();
        flipped.flip_vertical();
        let out = FrameEncoder::new(EncoderMode::Raw)
            .with_flip_vertical(true)
            .encode(frame)
            .unwrap();
        assert_eq!(out.as_bytes(), flipped.data.as_slice());
    }

    #[test]
    fn mode_deserializes_tagged() {
        let mode: EncoderMode = serde_json::from_str(r#"{"mode":"zstd","level":5}"#).unwrap();
        assert_eq!(mode, EncoderMode::Zstd { level: 5 });
    }
}
