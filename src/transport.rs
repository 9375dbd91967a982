//! Shared-memory frame-transport contract.
//!
//! The transport itself is an external collaborator; this module defines the
//! interface the replay server consumes, the stream identifiers, and a sink
//! implementation for tests and benchmarks.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

/// Transport stream identifier; each camera publishes to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    Road,
    Driver,
    WideRoad,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Road => write!(f, "road"),
            StreamType::Driver => write!(f, "driver"),
            StreamType::WideRoad => write!(f, "wideRoad"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no buffers created for stream {0}")]
    UnknownStream(StreamType),

    #[error("payload is {got} bytes, stream {stream} expects {expected}")]
    PayloadSize {
        stream: StreamType,
        got: usize,
        expected: usize,
    },

    #[error("transport backend: {0}")]
    Backend(String),
}

/// Shared-memory publish/subscribe primitive delivering frames to consumers.
///
/// `send` is called concurrently from the channel workers, one stream per
/// worker; implementations must tolerate concurrent sends on distinct
/// streams. Payload length must equal the `buffer_size` the stream's buffers
/// were created with.
pub trait FrameTransport: Send + Sync {
    /// Allocate `count` slots of `buffer_size` bytes for one stream.
    #[allow(clippy::too_many_arguments)]
    fn create_buffers(
        &self,
        stream: StreamType,
        count: usize,
        width: u32,
        height: u32,
        buffer_size: usize,
        stride: usize,
        uv_offset: usize,
    ) -> Result<(), TransportError>;

    /// Start accepting subscriber connections.
    fn start_listener(&self) -> Result<(), TransportError>;

    /// Publish one frame with its capture timestamps.
    fn send(
        &self,
        stream: StreamType,
        payload: &[u8],
        frame_id: u64,
        timestamp_sof: u64,
        timestamp_eof: u64,
    ) -> Result<(), TransportError>;
}

/// Builds the transport handle; invoked once at startup and again on every
/// geometry change, so a builder may return a fresh handle or a shared one.
pub type TransportBuilder = Box<dyn Fn() -> anyhow::Result<Arc<dyn FrameTransport>> + Send>;

/// Transport handle shared between the server and the channel workers;
/// swapped out under the write lock during reconfiguration.
pub(crate) type SharedTransport = Arc<RwLock<Arc<dyn FrameTransport>>>;

/// Size-validating sink transport.
///
/// Enforces the payload/slot-size contract and counts sends per stream while
/// discarding the data. Used by the smoke binary and tests.
#[derive(Debug, Default)]
pub struct NullTransport {
    slot_sizes: Mutex<HashMap<StreamType, usize>>,
    sent: Mutex<HashMap<StreamType, u64>>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames accepted so far on one stream.
    pub fn sent(&self, stream: StreamType) -> u64 {
        self.sent.lock().unwrap().get(&stream).copied().unwrap_or(0)
    }
}

impl FrameTransport for NullTransport {
    fn create_buffers(
        &self,
        stream: StreamType,
        _count: usize,
        _width: u32,
        _height: u32,
        buffer_size: usize,
        _stride: usize,
        _uv_offset: usize,
    ) -> Result<(), TransportError> {
        self.slot_sizes.lock().unwrap().insert(stream, buffer_size);
        Ok(())
    }

    fn start_listener(&self) -> Result<(), TransportError> {
        Ok(())
    }

    fn send(
        &self,
        stream: StreamType,
        payload: &[u8],
        _frame_id: u64,
        _timestamp_sof: u64,
        _timestamp_eof: u64,
    ) -> Result<(), TransportError> {
        let expected = self
            .slot_sizes
            .lock()
            .unwrap()
            .get(&stream)
            .copied()
            .ok_or(TransportError::UnknownStream(stream))?;
        if payload.len() != expected {
            return Err(TransportError::PayloadSize {
                stream,
                got: payload.len(),
                expected,
            });
        }
        *self.sent.lock().unwrap().entry(stream).or_default() += 1;
        Ok(())
    }
}
