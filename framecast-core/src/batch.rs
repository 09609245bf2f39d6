//! Batch wire format.
//!
//! Several frames are shipped to the collector as one length-prefixed
//! message. All integers are big-endian (network order) regardless of
//! host byte order.
//!
//! ## Wire format
//!
//! ```text
//! frame_count:    u32  (4)
//! repeated frame_count times:
//!   frame_length: u32  (4)
//!   frame_bytes:  [u8] (frame_length)
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::FramecastError;
use crate::frame::Frame;

/// Size of the leading frame-count field.
pub const COUNT_HEADER_SIZE: usize = 4;

/// Size of each per-frame length field.
pub const LENGTH_HEADER_SIZE: usize = 4;

// ── Batch ────────────────────────────────────────────────────────

/// An assembled, immutable batch message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    frame_count: u32,
    bytes: Bytes,
}

impl Batch {
    /// Serialize `frames` in order into a single batch body.
    pub fn assemble(frames: &[Frame]) -> Result<Self, FramecastError> {
        let frame_count = u32::try_from(frames.len()).map_err(|_| {
            FramecastError::Other(format!("too many frames for one batch: {}", frames.len()))
        })?;

        let total = COUNT_HEADER_SIZE
            + frames
                .iter()
                .map(|f| LENGTH_HEADER_SIZE + f.len())
                .sum::<usize>();
        let mut buf = BytesMut::with_capacity(total);

        buf.put_u32(frame_count);
        for frame in frames {
            let len = u32::try_from(frame.len()).map_err(|_| FramecastError::FrameTooLarge {
                size: frame.len(),
                max: u32::MAX as usize,
            })?;
            buf.put_u32(len);
            buf.put_slice(frame.as_bytes());
        }

        debug_assert_eq!(buf.len(), total);
        Ok(Self {
            frame_count,
            bytes: buf.freeze(),
        })
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Total encoded length, headers included.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

// ── BatchReader ──────────────────────────────────────────────────

/// Iterator over the frames of a batch body.
///
/// Yields one `Ok(Frame)` per complete frame and a single `Err` at the
/// first truncated header or payload, after which it is exhausted.
/// Frames before the truncation are still returned, so a receiver can
/// salvage a partially delivered batch.
pub struct BatchReader {
    data: Bytes,
    offset: usize,
    remaining: u32,
    declared: u32,
    failed: bool,
}

impl BatchReader {
    /// Start reading a batch. Fails only if the count header is missing.
    pub fn new(data: impl Into<Bytes>) -> Result<Self, FramecastError> {
        let data = data.into();
        let Some(header) = data.get(..COUNT_HEADER_SIZE) else {
            return Err(FramecastError::TruncatedBatch("missing frame count header"));
        };
        let declared = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        Ok(Self {
            data,
            offset: COUNT_HEADER_SIZE,
            remaining: declared,
            declared,
            failed: false,
        })
    }

    /// Frame count announced by the header.
    pub fn declared_count(&self) -> u32 {
        self.declared
    }

    /// Bytes not yet consumed.
    pub fn remaining_bytes(&self) -> usize {
        self.data.len() - self.offset
    }

    fn fail(&mut self, reason: &'static str) -> Option<Result<Frame, FramecastError>> {
        self.failed = true;
        Some(Err(FramecastError::TruncatedBatch(reason)))
    }
}

impl Iterator for BatchReader {
    type Item = Result<Frame, FramecastError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining == 0 {
            return None;
        }

        let Some(len_bytes) = self.data.get(self.offset..self.offset + LENGTH_HEADER_SIZE) else {
            return self.fail("incomplete frame header");
        };
        let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]])
            as usize;
        let start = self.offset + LENGTH_HEADER_SIZE;

        if start + len > self.data.len() {
            return self.fail("incomplete frame data");
        }

        self.offset = start + len;
        self.remaining -= 1;
        Some(Ok(Frame::new(self.data.slice(start..start + len))))
    }
}

/// Strictly parse a batch body: every declared frame must be present
/// and no bytes may follow the last one.
pub fn parse_batch(data: impl Into<Bytes>) -> Result<Vec<Frame>, FramecastError> {
    let mut reader = BatchReader::new(data)?;
    let frames = reader.by_ref().collect::<Result<Vec<_>, _>>()?;
    match reader.remaining_bytes() {
        0 => Ok(frames),
        n => Err(FramecastError::TrailingBytes(n)),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_big_endian() {
        let batch = Batch::assemble(&[Frame::new(vec![0xAA, 0xBB]), Frame::new(vec![0xCC])]).unwrap();
        assert_eq!(
            batch.as_bytes(),
            &[
                0, 0, 0, 2, // count
                0, 0, 0, 2, 0xAA, 0xBB, // frame 0
                0, 0, 0, 1, 0xCC, // frame 1
            ]
        );
        assert_eq!(batch.frame_count(), 2);
        assert_eq!(batch.len(), COUNT_HEADER_SIZE + 2 * LENGTH_HEADER_SIZE + 3);
    }

    #[test]
    fn three_frames_parse_back_exactly() {
        let frames = vec![
            Frame::new(b"first".to_vec()),
            Frame::new(vec![0u8; 300]),
            Frame::new(b"x".to_vec()),
        ];
        let batch = Batch::assemble(&frames).unwrap();
        let parsed = parse_batch(batch.into_bytes()).unwrap();
        assert_eq!(parsed, frames);
    }

    #[test]
    fn sixty_single_byte_frames_stay_ordered() {
        let frames: Vec<Frame> = (0..60u8).map(|i| Frame::new(vec![i])).collect();
        let batch = Batch::assemble(&frames).unwrap();
        assert_eq!(batch.frame_count(), 60);

        let parsed = parse_batch(batch.into_bytes()).unwrap();
        let bytes: Vec<u8> = parsed.iter().map(|f| f.as_bytes()[0]).collect();
        assert_eq!(bytes, (0..60u8).collect::<Vec<_>>());
    }

    #[test]
    fn missing_count_header() {
        assert!(matches!(
            parse_batch(vec![0u8, 0, 1]),
            Err(FramecastError::TruncatedBatch(_))
        ));
    }

    #[test]
    fn reader_salvages_frames_before_truncation() {
        let batch = Batch::assemble(&[Frame::new(vec![1, 2, 3]), Frame::new(vec![4, 5, 6])]).unwrap();
        let mut bytes = batch.as_bytes().to_vec();
        bytes.truncate(bytes.len() - 1);

        let results: Vec<_> = BatchReader::new(bytes.clone()).unwrap().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().as_bytes(), &[1, 2, 3]);
        assert!(results[1].is_err());

        assert!(parse_batch(bytes).is_err());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let batch = Batch::assemble(&[Frame::new(vec![7])]).unwrap();
        let mut bytes = batch.as_bytes().to_vec();
        bytes.extend_from_slice(&[0, 0]);
        assert!(matches!(parse_batch(bytes), Err(FramecastError::TrailingBytes(2))));
    }

    #[test]
    fn empty_batch_is_header_only() {
        let batch = Batch::assemble(&[]).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.as_bytes(), &[0, 0, 0, 0]);
        assert!(parse_batch(batch.into_bytes()).unwrap().is_empty());
    }
}
