//! Per-camera replay channels.
//!
//! Three independent channels exist, one per camera type, each owning a
//! dedicated worker thread, an inbound work queue, a bounded decoded-frame
//! cache, and the aligned buffer geometry for its stream.

pub mod cache;
pub mod geometry;
pub mod repack;
pub(crate) mod worker;

use crate::config::BUFFER_COUNT;
use crate::event::FrameEvent;
use crate::source::FrameSource;
use crate::transport::StreamType;
use self::cache::FrameCache;
use self::geometry::FrameGeometry;
use std::fmt;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Camera identity; a fixed, closed set with one replay channel each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraType {
    Road,
    Driver,
    WideRoad,
}

impl CameraType {
    pub const ALL: [CameraType; 3] = [CameraType::Road, CameraType::Driver, CameraType::WideRoad];

    /// The transport stream this camera publishes to.
    pub fn stream(self) -> StreamType {
        match self {
            CameraType::Road => StreamType::Road,
            CameraType::Driver => StreamType::Driver,
            CameraType::WideRoad => StreamType::WideRoad,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            CameraType::Road => 0,
            CameraType::Driver => 1,
            CameraType::WideRoad => 2,
        }
    }
}

impl fmt::Display for CameraType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraType::Road => write!(f, "road"),
            CameraType::Driver => write!(f, "driver"),
            CameraType::WideRoad => write!(f, "wideRoad"),
        }
    }
}

/// One unit of work for a channel worker.
pub(crate) enum WorkItem {
    /// Replay one frame: resolve via the event, decode from the source,
    /// publish.
    Frame(Arc<dyn FrameSource>, FrameEvent),
    /// Terminate the worker.
    Stop,
}

/// Channel state shared between the worker and the reconfiguring server.
///
/// The server only touches it after a drain, so the mutex is uncontended in
/// steady state.
pub(crate) struct CameraShared {
    pub geometry: Option<FrameGeometry>,
    pub cache: FrameCache,
}

/// Per-camera replay channel owned by the server.
pub(crate) struct Camera {
    pub kind: CameraType,
    /// Requested frame size; zero until configured or a source declares it.
    pub width: u32,
    pub height: u32,
    pub shared: Arc<Mutex<CameraShared>>,
    pub sender: Option<Sender<WorkItem>>,
    pub worker: Option<JoinHandle<()>>,
}

impl Camera {
    pub fn new(kind: CameraType) -> Self {
        Camera {
            kind,
            width: 0,
            height: 0,
            shared: Arc::new(Mutex::new(CameraShared {
                geometry: None,
                cache: FrameCache::new(BUFFER_COUNT),
            })),
            sender: None,
            worker: None,
        }
    }

    pub fn worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}
