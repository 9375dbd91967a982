use crate::camera::CameraType;
use std::time::Duration;

/// Number of transport buffer slots created per stream.
///
/// Also bounds each channel's decoded-frame cache, so a cached frame never
/// outlives the transport slots it could still be published into.
pub const BUFFER_COUNT: usize = 40;

/// Slot-size multiplier for NV12 streams: `buffer_size = NV12_BUFFER_MULT * stride`.
///
/// The downstream consumer allocates exactly this many bytes per slot (the
/// value comes from its v4l2 buffer negotiation, not from the plane layout),
/// so it must match the transport's expectation and is never rederived here.
pub const NV12_BUFFER_MULT: usize = 2346;

/// How long a channel worker blocks on its queue before re-checking the
/// shutdown flag.
pub const QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Initial per-camera frame sizes for the replay server.
///
/// Cameras left unset stay dormant until the first submitted source declares
/// their size.
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    sizes: Vec<(CameraType, u32, u32)>,
}

impl ReplayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial frame size for one camera.
    pub fn with_camera(mut self, camera: CameraType, width: u32, height: u32) -> Self {
        self.sizes.retain(|(kind, _, _)| *kind != camera);
        self.sizes.push((camera, width, height));
        self
    }

    pub fn initial_size(&self, camera: CameraType) -> Option<(u32, u32)> {
        self.sizes
            .iter()
            .find(|(kind, _, _)| *kind == camera)
            .map(|(_, width, height)| (*width, *height))
    }
}

/// Returns a version as specified in Cargo.toml
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
