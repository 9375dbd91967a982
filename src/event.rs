//! Per-frame metadata events driving the replay.

use crate::camera::CameraType;

/// Encoder index carried by a metadata event for one camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeIndex {
    /// Frame position within the source segment (decode-local).
    pub segment_index: u32,
    /// Stable frame identifier; the cache and transport key.
    pub frame_id: u64,
    /// Capture start-of-frame timestamp, nanoseconds.
    pub timestamp_sof: u64,
    /// Capture end-of-frame timestamp, nanoseconds.
    pub timestamp_eof: u64,
}

/// One per-frame metadata event, carrying the encoder index of every camera.
///
/// Each camera reads its own sub-structure; the mapping is a fixed, closed
/// dispatch over the camera set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameEvent {
    pub road: EncodeIndex,
    pub driver: EncodeIndex,
    pub wide_road: EncodeIndex,
}

impl FrameEvent {
    /// The encoder index belonging to the given camera.
    pub fn encode_index(&self, camera: CameraType) -> EncodeIndex {
        match camera {
            CameraType::Road => self.road,
            CameraType::Driver => self.driver,
            CameraType::WideRoad => self.wide_road,
        }
    }
}
