//! Multi-channel video-frame replay server.
//!
//! Replays previously recorded, compressed video segments: given a segment
//! source and a stream of per-frame metadata events, each camera channel
//! decodes frames on demand, repacks them into the hardware-aligned NV12
//! layout, and republishes them over a shared-memory frame transport,
//! preserving the original capture timestamps.
//!
//! # Architecture
//!
//! - Each camera type (road, driver, wide road) gets its own channel: a
//!   dedicated worker thread, a work queue, and a bounded decoded-frame
//!   cache.
//! - The [`server::CameraServer`] orchestrates channel lifecycle: buffer
//!   creation, reconfiguration on frame-size changes, blocking drain, and
//!   cooperative shutdown.
//! - The frame transport and the segment decoder are external collaborators
//!   behind the [`transport::FrameTransport`] and [`source::FrameSource`]
//!   traits.

pub mod camera;
pub mod config;
pub mod event;
pub mod server;
pub mod source;
pub mod transport;
pub mod utils;

pub use camera::CameraType;
pub use camera::geometry::FrameGeometry;
pub use config::ReplayConfig;
pub use event::{EncodeIndex, FrameEvent};
pub use server::CameraServer;
pub use source::FrameSource;
pub use transport::{FrameTransport, NullTransport, StreamType, TransportBuilder, TransportError};
pub use utils::perf::StatsSummary;
