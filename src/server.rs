//! Replay server: channel orchestration, reconfiguration, drain, shutdown.

use crate::camera::geometry::FrameGeometry;
use crate::camera::worker::CameraWorker;
use crate::camera::{Camera, CameraType, WorkItem};
use crate::config::{BUFFER_COUNT, ReplayConfig};
use crate::event::FrameEvent;
use crate::source::FrameSource;
use crate::transport::{SharedTransport, TransportBuilder};
use crate::utils::perf::{ReplayStats, StatsSummary};
use crate::utils::sync::{InFlight, ShutdownFlag};
use anyhow::{Context, Result, bail};
use log::info;
use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::thread;

/// Multi-channel video-frame replay server.
///
/// Owns the transport handle and one replay channel per camera. Frames are
/// submitted per channel together with the segment source that can decode
/// them and the metadata event that locates them; each channel's worker
/// decodes, repacks to the aligned layout, and publishes with the original
/// capture timestamps.
///
/// When a submitted source declares a different frame size than the channel
/// currently has, all in-flight work is drained and the transport buffers
/// are recreated before the frame is enqueued, so a publish never races a
/// reconfiguration.
pub struct CameraServer {
    builder: TransportBuilder,
    transport: SharedTransport,
    cameras: [Camera; 3],
    in_flight: InFlight,
    stop: ShutdownFlag,
    stats: Arc<ReplayStats>,
}

impl CameraServer {
    /// Create the server, build the transport, and start the channels with
    /// known geometry.
    pub fn new(builder: TransportBuilder, config: &ReplayConfig) -> Result<Self> {
        let transport = builder().context("creating frame transport")?;

        let mut server = CameraServer {
            builder,
            transport: Arc::new(RwLock::new(transport)),
            cameras: CameraType::ALL.map(Camera::new),
            in_flight: InFlight::new(),
            stop: ShutdownFlag::new(),
            stats: Arc::new(ReplayStats::new()),
        };

        for camera in &mut server.cameras {
            if let Some((width, height)) = config.initial_size(camera.kind) {
                camera.width = width;
                camera.height = height;
            }
        }

        server.configure_channels()?;
        Ok(server)
    }

    /// Queue one frame for replay on the given camera channel.
    pub fn submit(
        &mut self,
        camera: CameraType,
        source: Arc<dyn FrameSource>,
        event: &FrameEvent,
    ) -> Result<()> {
        let (width, height) = (source.width(), source.height());
        if width == 0 || height == 0 {
            bail!("camera[{camera}] source reports zero frame size");
        }

        let index = camera.index();
        if self.cameras[index].width != width || self.cameras[index].height != height {
            self.cameras[index].width = width;
            self.cameras[index].height = height;
            // Never rebuild buffers under an in-flight publish that still
            // uses the old geometry.
            self.drain();
            self.reconfigure()?;
        }

        let Some(sender) = self.cameras[index].sender.as_ref() else {
            bail!("camera[{camera}] has no worker");
        };

        self.in_flight.increment();
        if sender.send(WorkItem::Frame(source, *event)).is_err() {
            self.in_flight.decrement();
            bail!("camera[{camera}] worker queue disconnected");
        }
        Ok(())
    }

    /// Block until every submitted frame has been processed.
    pub fn drain(&self) {
        self.in_flight.wait_idle();
    }

    /// Stop all channel workers and join them. Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.stop.cancel();
        for camera in &mut self.cameras {
            if let Some(sender) = camera.sender.take() {
                let _ = sender.send(WorkItem::Stop);
            }
            if let Some(worker) = camera.worker.take() {
                let _ = worker.join();
            }
        }
    }

    /// Snapshot of the replay counters.
    pub fn stats(&self) -> StatsSummary {
        self.stats.summary()
    }

    /// Rebuild the transport handle and reconfigure every channel.
    fn reconfigure(&mut self) -> Result<()> {
        let transport = (self.builder)().context("recreating frame transport")?;
        *self.transport.write().unwrap() = transport;
        self.configure_channels()
    }

    /// Create transport buffers and ensure a live worker for each channel
    /// with known geometry. Caches are cleared on every pass; geometry that
    /// did not change produces identical buffers.
    fn configure_channels(&mut self) -> Result<()> {
        let transport = self.transport.read().unwrap().clone();

        for camera in &mut self.cameras {
            camera.shared.lock().unwrap().cache.clear();

            if camera.width == 0 || camera.height == 0 {
                continue;
            }

            let geometry = FrameGeometry::new(camera.width, camera.height);
            info!(
                "camera[{}] frame size {}x{}, stride {}, buffer {}",
                camera.kind, geometry.width, geometry.height, geometry.stride, geometry.buffer_size
            );
            transport
                .create_buffers(
                    camera.kind.stream(),
                    BUFFER_COUNT,
                    geometry.width,
                    geometry.height,
                    geometry.buffer_size,
                    geometry.stride,
                    geometry.uv_offset(),
                )
                .with_context(|| format!("creating buffers for camera[{}]", camera.kind))?;
            camera.shared.lock().unwrap().geometry = Some(geometry);

            if !camera.worker_alive() {
                spawn_worker(
                    camera,
                    &self.transport,
                    &self.in_flight,
                    &self.stop,
                    &self.stats,
                )?;
            }
        }

        transport
            .start_listener()
            .context("starting transport listener")?;
        Ok(())
    }
}

impl Drop for CameraServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_worker(
    camera: &mut Camera,
    transport: &SharedTransport,
    in_flight: &InFlight,
    stop: &ShutdownFlag,
    stats: &Arc<ReplayStats>,
) -> Result<()> {
    let (sender, queue) = mpsc::channel();
    let worker = CameraWorker {
        kind: camera.kind,
        queue,
        shared: Arc::clone(&camera.shared),
        transport: Arc::clone(transport),
        in_flight: in_flight.clone(),
        stop: stop.clone(),
        stats: Arc::clone(stats),
    };

    let handle = thread::Builder::new()
        .name(format!("camera-{}", camera.kind))
        .spawn(move || worker.run())
        .with_context(|| format!("spawning camera[{}] worker", camera.kind))?;

    camera.sender = Some(sender);
    camera.worker = Some(handle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EncodeIndex;
    use crate::transport::{FrameTransport, StreamType, TransportError};
    use bytes::Bytes;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct TestSource {
        width: u32,
        height: u32,
        frames: usize,
        fail_at: Option<usize>,
    }

    impl TestSource {
        fn new(width: u32, height: u32, frames: usize) -> Self {
            TestSource {
                width,
                height,
                frames,
                fail_at: None,
            }
        }
    }

    impl FrameSource for TestSource {
        fn frame_count(&self) -> usize {
            self.frames
        }

        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn get(&self, local_index: usize) -> Result<Bytes> {
            if self.fail_at == Some(local_index) {
                bail!("synthetic decode failure at {local_index}");
            }
            if local_index >= self.frames {
                bail!("index {local_index} out of range");
            }
            let len = (self.width * self.height * 3 / 2) as usize;
            Ok(Bytes::from(vec![local_index as u8; len]))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct SentFrame {
        stream: StreamType,
        frame_id: u64,
        payload_len: usize,
        timestamp_sof: u64,
        timestamp_eof: u64,
    }

    /// Records every buffer creation and send for inspection.
    #[derive(Default)]
    struct RecordingTransport {
        slot_sizes: Mutex<HashMap<StreamType, usize>>,
        created: Mutex<Vec<(StreamType, usize)>>,
        sent: Mutex<Vec<SentFrame>>,
    }

    impl FrameTransport for RecordingTransport {
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
            self.created.lock().unwrap().push((stream, buffer_size));
            Ok(())
        }

        fn start_listener(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn send(
            &self,
            stream: StreamType,
            payload: &[u8],
            frame_id: u64,
            timestamp_sof: u64,
            timestamp_eof: u64,
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
            self.sent.lock().unwrap().push(SentFrame {
                stream,
                frame_id,
                payload_len: payload.len(),
                timestamp_sof,
                timestamp_eof,
            });
            Ok(())
        }
    }

    fn server_with(transport: &Arc<RecordingTransport>) -> CameraServer {
        let shared = Arc::clone(transport);
        CameraServer::new(
            Box::new(move || Ok(Arc::clone(&shared) as Arc<dyn FrameTransport>)),
            &ReplayConfig::new(),
        )
        .unwrap()
    }

    fn road_event(index: u32) -> FrameEvent {
        FrameEvent {
            road: EncodeIndex {
                segment_index: index,
                frame_id: 100 + index as u64,
                timestamp_sof: 1_000 * index as u64,
                timestamp_eof: 1_000 * index as u64 + 50,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_sequential_frames_publish_in_order() {
        let transport = Arc::new(RecordingTransport::default());
        let mut server = server_with(&transport);
        let source: Arc<dyn FrameSource> = Arc::new(TestSource::new(64, 32, 8));

        for i in 0..5 {
            server
                .submit(CameraType::Road, Arc::clone(&source), &road_event(i))
                .unwrap();
        }
        server.drain();

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 5);
        let geometry = FrameGeometry::new(64, 32);
        for (i, frame) in sent.iter().enumerate() {
            assert_eq!(frame.stream, StreamType::Road);
            assert_eq!(frame.frame_id, 100 + i as u64);
            assert_eq!(frame.payload_len, geometry.buffer_size);
            // Timestamps pass through untouched.
            assert_eq!(frame.timestamp_sof, 1_000 * i as u64);
            assert_eq!(frame.timestamp_eof, 1_000 * i as u64 + 50);
        }

        assert_eq!(server.stats().frames_published, 5);
        server.shutdown();
    }

    #[test]
    fn test_decode_failure_skips_frame() {
        let transport = Arc::new(RecordingTransport::default());
        let mut server = server_with(&transport);
        let source: Arc<dyn FrameSource> = Arc::new(TestSource {
            width: 64,
            height: 32,
            frames: 5,
            fail_at: Some(3),
        });

        for i in 0..5 {
            server
                .submit(CameraType::Road, Arc::clone(&source), &road_event(i))
                .unwrap();
        }
        server.drain();

        let sent = transport.sent.lock().unwrap().clone();
        let ids: Vec<u64> = sent.iter().map(|frame| frame.frame_id).collect();
        assert_eq!(ids, [100, 101, 102, 104]);

        let stats = server.stats();
        assert_eq!(stats.frames_published, 4);
        assert_eq!(stats.frames_skipped, 1);
        server.shutdown();
    }

    #[test]
    fn test_size_change_recreates_buffers() {
        let transport = Arc::new(RecordingTransport::default());
        let mut server = server_with(&transport);

        let small: Arc<dyn FrameSource> = Arc::new(TestSource::new(64, 32, 8));
        let large: Arc<dyn FrameSource> = Arc::new(TestSource::new(256, 64, 8));

        server
            .submit(CameraType::Road, Arc::clone(&small), &road_event(0))
            .unwrap();
        server
            .submit(CameraType::Road, Arc::clone(&large), &road_event(1))
            .unwrap();
        server.drain();

        let created = transport.created.lock().unwrap().clone();
        let small_geometry = FrameGeometry::new(64, 32);
        let large_geometry = FrameGeometry::new(256, 64);
        assert_eq!(
            created,
            vec![
                (StreamType::Road, small_geometry.buffer_size),
                (StreamType::Road, large_geometry.buffer_size),
            ]
        );

        let sent = transport.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].payload_len, small_geometry.buffer_size);
        assert_eq!(sent[1].payload_len, large_geometry.buffer_size);
        server.shutdown();
    }

    #[test]
    fn test_unchanged_size_does_not_reconfigure() {
        let transport = Arc::new(RecordingTransport::default());
        let mut server = server_with(&transport);
        let source: Arc<dyn FrameSource> = Arc::new(TestSource::new(64, 32, 8));

        server
            .submit(CameraType::Road, Arc::clone(&source), &road_event(0))
            .unwrap();
        let creations = transport.created.lock().unwrap().len();

        // Same geometry from a different source instance: no buffer churn.
        let twin: Arc<dyn FrameSource> = Arc::new(TestSource::new(64, 32, 8));
        server
            .submit(CameraType::Road, twin, &road_event(1))
            .unwrap();
        server.drain();

        assert_eq!(transport.created.lock().unwrap().len(), creations);
        server.shutdown();
    }

    #[test]
    fn test_reconfiguration_is_idempotent() {
        let transport = Arc::new(RecordingTransport::default());
        let mut server = server_with(&transport);

        let first: Arc<dyn FrameSource> = Arc::new(TestSource::new(1928, 1208, 4));
        let other: Arc<dyn FrameSource> = Arc::new(TestSource::new(64, 32, 4));

        server
            .submit(CameraType::Road, Arc::clone(&first), &road_event(0))
            .unwrap();
        server
            .submit(CameraType::Road, Arc::clone(&other), &road_event(1))
            .unwrap();
        server
            .submit(CameraType::Road, Arc::clone(&first), &road_event(2))
            .unwrap();
        server.drain();

        // The two reconfigurations with identical geometry produced
        // identically sized buffers.
        let created = transport.created.lock().unwrap().clone();
        assert_eq!(created.len(), 3);
        assert_eq!(created[0].1, created[2].1);
        server.shutdown();
    }

    #[test]
    fn test_channels_are_independent() {
        let transport = Arc::new(RecordingTransport::default());
        let mut server = server_with(&transport);
        let source: Arc<dyn FrameSource> = Arc::new(TestSource::new(64, 32, 8));

        let event = FrameEvent {
            road: EncodeIndex {
                segment_index: 0,
                frame_id: 500,
                ..Default::default()
            },
            driver: EncodeIndex {
                segment_index: 1,
                frame_id: 600,
                ..Default::default()
            },
            ..Default::default()
        };

        server
            .submit(CameraType::Road, Arc::clone(&source), &event)
            .unwrap();
        server
            .submit(CameraType::Driver, Arc::clone(&source), &event)
            .unwrap();
        server.drain();

        let sent = transport.sent.lock().unwrap().clone();
        let road: Vec<u64> = sent
            .iter()
            .filter(|frame| frame.stream == StreamType::Road)
            .map(|frame| frame.frame_id)
            .collect();
        let driver: Vec<u64> = sent
            .iter()
            .filter(|frame| frame.stream == StreamType::Driver)
            .map(|frame| frame.frame_id)
            .collect();
        assert_eq!(road, [500]);
        assert_eq!(driver, [600]);
        server.shutdown();
    }

    #[test]
    fn test_zero_size_source_rejected() {
        let transport = Arc::new(RecordingTransport::default());
        let mut server = server_with(&transport);
        let source: Arc<dyn FrameSource> = Arc::new(TestSource::new(0, 0, 8));

        assert!(
            server
                .submit(CameraType::Road, source, &road_event(0))
                .is_err()
        );
        assert_eq!(server.in_flight.pending(), 0);
        server.shutdown();
    }

    #[test]
    fn test_shutdown_is_repeatable() {
        let transport = Arc::new(RecordingTransport::default());
        let mut server = server_with(&transport);
        let source: Arc<dyn FrameSource> = Arc::new(TestSource::new(64, 32, 8));

        server
            .submit(CameraType::Road, source, &road_event(0))
            .unwrap();
        server.drain();
        server.shutdown();
        server.shutdown();

        for camera in &server.cameras {
            assert!(!camera.worker_alive());
        }
    }

    #[test]
    fn test_initial_sizes_create_buffers_up_front() {
        let transport = Arc::new(RecordingTransport::default());
        let shared = Arc::clone(&transport);
        let config = ReplayConfig::new()
            .with_camera(CameraType::Road, 1928, 1208)
            .with_camera(CameraType::WideRoad, 1928, 1208);
        let server = CameraServer::new(
            Box::new(move || Ok(Arc::clone(&shared) as Arc<dyn FrameTransport>)),
            &config,
        )
        .unwrap();

        let created = transport.created.lock().unwrap().clone();
        let streams: Vec<StreamType> = created.iter().map(|(stream, _)| *stream).collect();
        assert_eq!(streams, [StreamType::Road, StreamType::WideRoad]);
        drop(server);
    }
}
