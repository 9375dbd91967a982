//! Channel worker: decode, repack, publish.

use super::repack::repack_nv12;
use super::{CameraShared, CameraType, WorkItem};
use crate::config::QUEUE_POLL_INTERVAL;
use crate::event::FrameEvent;
use crate::source::FrameSource;
use crate::transport::SharedTransport;
use crate::utils::perf::ReplayStats;
use crate::utils::sync::{InFlight, ShutdownFlag};
use anyhow::{Context, Result, bail};
use log::{debug, error};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};

/// Dedicated processing loop for one camera channel.
///
/// Frames are taken from the queue in submission order and published one at
/// a time, so ordering within the channel is FIFO. Per-frame failures are
/// logged and dropped; only the stop sentinel, the shutdown flag, or a
/// disconnected queue end the loop.
pub(crate) struct CameraWorker {
    pub(crate) kind: CameraType,
    pub(crate) queue: Receiver<WorkItem>,
    pub(crate) shared: Arc<Mutex<CameraShared>>,
    pub(crate) transport: SharedTransport,
    pub(crate) in_flight: InFlight,
    pub(crate) stop: ShutdownFlag,
    pub(crate) stats: Arc<ReplayStats>,
}

impl CameraWorker {
    pub fn run(self) {
        debug!("camera[{}] worker started", self.kind);

        loop {
            let item = match self.queue.recv_timeout(QUEUE_POLL_INTERVAL) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => {
                    if self.stop.cancelled() {
                        break;
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            };

            match item {
                WorkItem::Stop => break,
                WorkItem::Frame(source, event) => {
                    if let Err(err) = self.process(&source, &event) {
                        self.stats.record_skipped();
                        error!("camera[{}] replay error: {err:#}", self.kind);
                    }
                    self.in_flight.decrement();
                }
            }
        }

        debug!("camera[{}] worker finished", self.kind);
    }

    /// Publish one frame, then warm the cache for the next one.
    fn process(&self, source: &Arc<dyn FrameSource>, event: &FrameEvent) -> Result<()> {
        let idx = event.encode_index(self.kind);
        let mut shared = self.shared.lock().unwrap();
        let Some(geometry) = shared.geometry else {
            bail!("channel has no geometry configured");
        };

        let frame =
            shared
                .cache
                .get_or_decode(idx.frame_id, idx.segment_index as usize, source.as_ref());
        match frame {
            Some(frame) => {
                let payload = repack_nv12(&frame, &geometry)?;
                let transport = self.transport.read().unwrap().clone();
                transport
                    .send(
                        self.kind.stream(),
                        &payload,
                        idx.frame_id,
                        idx.timestamp_sof,
                        idx.timestamp_eof,
                    )
                    .with_context(|| format!("publishing frame {}", idx.frame_id))?;
                self.stats.record_published();
            }
            None => self.stats.record_skipped(),
        }

        // Opportunistic prefetch of the next frame; the result is unused and
        // any failure will be rediscovered when the frame is requested.
        shared.cache.get_or_decode(
            idx.frame_id + 1,
            idx.segment_index as usize + 1,
            source.as_ref(),
        );

        Ok(())
    }
}
