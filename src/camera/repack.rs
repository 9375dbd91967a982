//! NV12 plane repacking into the aligned transport layout.

use super::geometry::FrameGeometry;
use thiserror::Error;

/// Input buffer length is inconsistent with the declared geometry.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("frame is {got} bytes, expected {expected} for {width}x{height} nv12")]
pub struct ShapeMismatch {
    pub got: usize,
    pub expected: usize,
    pub width: u32,
    pub height: u32,
}

/// Repack an unpadded NV12 frame into the aligned layout.
///
/// Segment decoders return NV12 with the logical width as stride; the
/// transport expects the aligned stride, the aligned scanline counts, and a
/// payload filling the whole slot. The output is a single zero-initialized
/// allocation covering both: luma rows land at `row * stride`, chroma rows at
/// `uv_offset + row * stride`, every pad byte stays zero, and the tail is
/// already sized to the transport slot.
///
/// The input must be exactly `width * height * 3 / 2` bytes; anything else is
/// rejected, never truncated.
pub fn repack_nv12(src: &[u8], geometry: &FrameGeometry) -> Result<Vec<u8>, ShapeMismatch> {
    let width = geometry.width as usize;
    let height = geometry.height as usize;

    let expected = geometry.packed_len();
    if src.len() != expected {
        return Err(ShapeMismatch {
            got: src.len(),
            expected,
            width: geometry.width,
            height: geometry.height,
        });
    }

    let stride = geometry.stride;
    let uv_offset = geometry.uv_offset();
    let mut out = vec![0u8; geometry.padded_len()];

    let (luma, chroma) = src.split_at(width * height);
    for (row, line) in luma.chunks_exact(width).enumerate() {
        let at = row * stride;
        out[at..at + width].copy_from_slice(line);
    }
    for (row, line) in chroma.chunks_exact(width).enumerate() {
        let at = uv_offset + row * stride;
        out[at..at + width].copy_from_slice(line);
    }

    Ok(out)
}
