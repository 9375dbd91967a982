use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Arg, Command};
use log::info;
use recast::config::{app_name, version};
use recast::{
    CameraServer, CameraType, EncodeIndex, FrameEvent, FrameSource, FrameTransport, NullTransport,
    ReplayConfig,
};
use std::sync::Arc;
use std::time::Instant;
use std::{panic, process};

/// Synthetic NV12 segment used to exercise the full replay path without
/// recorded footage: a moving luma gradient over neutral chroma.
struct SyntheticSource {
    width: u32,
    height: u32,
    frames: usize,
}

impl FrameSource for SyntheticSource {
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
        if local_index >= self.frames {
            bail!("frame {local_index} out of range");
        }

        let width = self.width as usize;
        let height = self.height as usize;
        let mut data = vec![128u8; width * height + width * (height / 2)];
        for row in 0..height {
            let line = &mut data[row * width..(row + 1) * width];
            for (col, px) in line.iter_mut().enumerate() {
                *px = ((row + col + local_index) & 0xff) as u8;
            }
        }
        Ok(Bytes::from(data))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // invoke the default handler and exit the process
        orig_hook(panic_info);
        process::exit(105);
    }));

    // gracefully close when receiving SIGINT, SIGTERM, or SIGHUP
    ctrlc::set_handler(move || {
        process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let matches = Command::new(app_name())
        .version(version())
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("width")
                .long("width")
                .value_name("PIXELS")
                .help("Frame width of the synthetic segment.")
                .default_value("1928"),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_name("PIXELS")
                .help("Frame height of the synthetic segment.")
                .default_value("1208"),
        )
        .arg(
            Arg::new("frames")
                .short('n')
                .long("frames")
                .value_name("COUNT")
                .help("Number of frames to replay.")
                .default_value("100"),
        )
        .arg(
            Arg::new("camera")
                .long("camera")
                .value_name("TYPE")
                .help("Camera channel to replay on (road, driver, wideRoad).")
                .default_value("road"),
        )
        .get_matches();

    let width: u32 = matches
        .get_one::<String>("width")
        .unwrap()
        .parse()
        .context("parsing --width")?;
    let height: u32 = matches
        .get_one::<String>("height")
        .unwrap()
        .parse()
        .context("parsing --height")?;
    let frames: usize = matches
        .get_one::<String>("frames")
        .unwrap()
        .parse()
        .context("parsing --frames")?;
    let camera = match matches.get_one::<String>("camera").unwrap().as_str() {
        "road" => CameraType::Road,
        "driver" => CameraType::Driver,
        "wideRoad" => CameraType::WideRoad,
        other => bail!("unknown camera type '{other}'"),
    };

    let sink = Arc::new(NullTransport::new());
    let transport = Arc::clone(&sink);
    let mut server = CameraServer::new(
        Box::new(move || Ok(Arc::clone(&transport) as Arc<dyn FrameTransport>)),
        &ReplayConfig::new(),
    )?;

    let source: Arc<dyn FrameSource> = Arc::new(SyntheticSource {
        width,
        height,
        frames,
    });

    info!("replaying {frames} synthetic frames of {width}x{height} on camera[{camera}]");
    let start = Instant::now();
    for i in 0..frames {
        let index = EncodeIndex {
            segment_index: i as u32,
            frame_id: i as u64,
            timestamp_sof: i as u64 * 50_000_000,
            timestamp_eof: i as u64 * 50_000_000 + 20_000_000,
        };
        let mut event = FrameEvent::default();
        match camera {
            CameraType::Road => event.road = index,
            CameraType::Driver => event.driver = index,
            CameraType::WideRoad => event.wide_road = index,
        }
        server.submit(camera, Arc::clone(&source), &event)?;
    }
    server.drain();

    let elapsed = start.elapsed();
    info!(
        "replayed {} frames in {:.2?} ({:.1} fps) | {}",
        sink.sent(camera.stream()),
        elapsed,
        frames as f64 / elapsed.as_secs_f64(),
        server.stats()
    );

    server.shutdown();
    Ok(())
}
