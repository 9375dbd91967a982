//! Compressed-segment decoder contract.

use anyhow::Result;
use bytes::Bytes;

/// Decoded access to one recorded video segment.
///
/// Implementations wrap the segment decoder and hand out unpadded NV12
/// frames addressed by their position within the segment. The same source is
/// shared across the metadata events that reference it, so decoding must be
/// callable from the channel worker thread.
pub trait FrameSource: Send + Sync {
    /// Number of decodable frames in the segment.
    fn frame_count(&self) -> usize;

    /// Declared frame width in pixels.
    fn width(&self) -> u32;

    /// Declared frame height in pixels.
    fn height(&self) -> u32;

    /// Decode the frame at a segment-local index.
    ///
    /// Returns exactly `width * height * 3 / 2` bytes of unpadded NV12 data,
    /// or an error for an out-of-range index or corrupt frame.
    fn get(&self, local_index: usize) -> Result<Bytes>;
}
