//! Bounded decoded-frame cache.

use crate::source::FrameSource;
use bytes::Bytes;
use log::warn;
use std::collections::HashMap;

/// Bounded map from stable frame id to its decoded NV12 buffer.
///
/// Sequential replay assigns monotonically increasing frame ids, so evicting
/// the smallest key approximates oldest-first eviction. A source emitting
/// decreasing ids would degrade this to evicting non-oldest entries.
#[derive(Debug)]
pub struct FrameCache {
    frames: HashMap<u64, Bytes>,
    capacity: usize,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        FrameCache {
            frames: HashMap::new(),
            capacity,
        }
    }

    /// Return the cached frame for `frame_id`, decoding it on a miss.
    ///
    /// The source is consulted only when `local_index` is within its frame
    /// count. Decode failures are logged and yield `None`; a missing frame
    /// never aborts the channel.
    pub fn get_or_decode(
        &mut self,
        frame_id: u64,
        local_index: usize,
        source: &dyn FrameSource,
    ) -> Option<Bytes> {
        if let Some(frame) = self.frames.get(&frame_id) {
            return Some(frame.clone());
        }

        if local_index >= source.frame_count() {
            return None;
        }

        match source.get(local_index) {
            Ok(frame) => {
                self.frames.insert(frame_id, frame.clone());
                if self.frames.len() > self.capacity {
                    if let Some(oldest) = self.frames.keys().min().copied() {
                        self.frames.remove(&oldest);
                    }
                }
                Some(frame)
            }
            Err(err) => {
                warn!("failed to decode frame {frame_id}: {err:#}");
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, frame_id: u64) -> bool {
        self.frames.contains_key(&frame_id)
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
