//! Record command - capture a region until interrupted

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use deskrec_core::backend::SyntheticBackend;
use deskrec_core::{
    BackendKind, CaptureBackend, CaptureEvent, CaptureRegion, ConfigFile, DecodedFrame,
    DeskrecError, FrameRate, Recorder,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Frames buffered between the capture thread and this command
const EVENT_CAPACITY: usize = 8;

/// Arguments for the record command
#[derive(Args)]
pub struct RecordArgs {
    /// Region edges as LEFT,TOP,RIGHT,BOTTOM (e.g. "0,0,1920,1080")
    #[arg(short, long, conflicts_with = "size")]
    region: Option<String>,

    /// Region size as WIDTHxHEIGHT, placed at --offset
    #[arg(short, long)]
    size: Option<String>,

    /// Region origin as X,Y for --size (default: 0,0)
    #[arg(short, long, requires = "size")]
    offset: Option<String>,

    /// Frames per second (default: config file, then 30)
    #[arg(short, long)]
    fps: Option<u32>,

    /// Stop after this many seconds
    #[arg(short, long)]
    duration: Option<u64>,

    /// Capture backend (synthetic, ffmpeg)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    /// libavdevice input format for the ffmpeg backend (e.g. x11grab, dshow)
    #[arg(long)]
    device_format: Option<String>,

    /// Device URL for the ffmpeg backend (e.g. ":0.0")
    #[arg(long)]
    device: Option<String>,

    /// Synthetic backend only: the device "goes away" after this many frames
    #[arg(long)]
    frames: Option<u64>,

    /// Config file to read instead of the default one
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Parse "LEFT,TOP,RIGHT,BOTTOM"
fn parse_region(s: &str) -> Result<CaptureRegion> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Invalid region '{}': expected four integers", s))?;

    let &[left, top, right, bottom] = parts.as_slice() else {
        bail!("Invalid region '{}': expected LEFT,TOP,RIGHT,BOTTOM", s);
    };
    Ok(CaptureRegion::new(left, top, right, bottom)?)
}

/// Parse "WIDTHxHEIGHT" at origin "X,Y"
fn parse_size(size: &str, offset: &str) -> Result<CaptureRegion> {
    let (w, h) = size
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("Invalid size '{}': expected WIDTHxHEIGHT", size))?;
    let width: u32 = w.trim().parse().with_context(|| format!("Invalid width in '{}'", size))?;
    let height: u32 = h.trim().parse().with_context(|| format!("Invalid height in '{}'", size))?;

    let (x, y) = offset
        .split_once(',')
        .ok_or_else(|| anyhow!("Invalid offset '{}': expected X,Y", offset))?;
    let x: i32 = x.trim().parse().with_context(|| format!("Invalid offset '{}'", offset))?;
    let y: i32 = y.trim().parse().with_context(|| format!("Invalid offset '{}'", offset))?;

    Ok(CaptureRegion::from_origin_size(x, y, width, height)?)
}

/// Print an error together with its hint, then hand it back
fn report(err: DeskrecError) -> anyhow::Error {
    if let Some(hint) = err.user_hint() {
        eprintln!("Hint: {}", hint);
    }
    err.into()
}

/// Start a capture session
pub async fn record(args: RecordArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => ConfigFile::load_from(path).map_err(report)?,
        None => ConfigFile::load_or_default(),
    };

    let region = match (&args.region, &args.size) {
        (Some(region), _) => parse_region(region)?,
        (None, Some(size)) => parse_size(size, args.offset.as_deref().unwrap_or("0,0"))?,
        (None, None) => file.capture.region.ok_or_else(|| {
            anyhow!("No capture region: pass --region or --size, or set [capture] region in the config file")
        })?,
    };

    let fps = match args.fps {
        Some(fps) => FrameRate::new(fps).map_err(report)?,
        None => file.capture.fps,
    };

    let backend = args.backend.unwrap_or(file.device.backend);
    let duration = args.duration.map(Duration::from_secs);

    println!("deskrec - Starting Capture\n");
    println!("Configuration:");
    println!("  Region:    {} ({}x{})", region, region.width(), region.height());
    println!("  Framerate: {}", fps);
    println!("  Backend:   {}", backend);
    if let Some(duration) = duration {
        println!("  Duration:  {}s", duration.as_secs());
    }
    println!();

    match backend {
        BackendKind::Synthetic => {
            if args.device_format.is_some() || args.device.is_some() {
                warn!("--device-format and --device are ignored by the synthetic backend");
            }
            let mut synthetic = SyntheticBackend::new();
            if let Some(frames) = args.frames {
                synthetic = synthetic.with_frame_limit(frames);
            }
            run(synthetic, region, fps, duration).await
        }
        BackendKind::Ffmpeg => {
            let device_format = args.device_format.or(file.device.format);
            let device_url = args.device.or(file.device.url);
            run_ffmpeg(device_format, device_url, region, fps, duration).await
        }
    }
}

#[cfg(feature = "ffmpeg")]
async fn run_ffmpeg(
    format: Option<String>,
    url: Option<String>,
    region: CaptureRegion,
    fps: FrameRate,
    duration: Option<Duration>,
) -> Result<()> {
    use deskrec_core::backend::{DeviceSpec, FfmpegBackend};

    let default = DeviceSpec::platform_default();
    let device = DeviceSpec::new(
        format.unwrap_or(default.format),
        url.unwrap_or(default.url),
    );
    println!("Device: {} \"{}\"\n", device.format, device.url);

    run(FfmpegBackend::new(device), region, fps, duration).await
}

#[cfg(not(feature = "ffmpeg"))]
async fn run_ffmpeg(
    _format: Option<String>,
    _url: Option<String>,
    _region: CaptureRegion,
    _fps: FrameRate,
    _duration: Option<Duration>,
) -> Result<()> {
    bail!("This build has no FFmpeg support; rebuild with `--features ffmpeg` or use --backend synthetic")
}

/// Drive a recorder until Ctrl+C, the duration elapses, or the run fails
async fn run<B: CaptureBackend>(
    backend: B,
    region: CaptureRegion,
    fps: FrameRate,
    duration: Option<Duration>,
) -> Result<()> {
    let mut recorder = Recorder::new(backend);
    let mut events = recorder.event_channel(EVENT_CAPACITY);

    recorder
        .init(region, fps)
        .map_err(|code| report(code.into()))
        .context("Failed to initialize capture")?;

    if let Some(info) = recorder.session_info() {
        println!("Stream:");
        println!("  Codec:        {}", info.stream.codec);
        println!("  Pixel format: {}", info.pixel_format);
        println!("  Time base:    {}", recorder.time_base());
        if let Some(start) = recorder.start_time() {
            println!("  Start time:   {}", start);
        }
        println!();
    }

    recorder
        .start()
        .map_err(|code| report(code.into()))
        .context("Failed to start capture")?;
    let started = Instant::now();

    println!("Capture started! Press Ctrl+C to stop...\n");

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;

    let mut last_frame: Option<Arc<DecodedFrame>> = None;

    let failure = loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                }
                println!("\nReceived interrupt signal...");
                break None;
            }
            _ = &mut deadline => {
                info!("Capture duration reached");
                break None;
            }
            _ = ticker.tick() => {
                println!("  {}", recorder.stats());
            }
            event = events.recv() => match event {
                Ok(CaptureEvent::Frame(frame)) => last_frame = Some(frame),
                Ok(CaptureEvent::Error(code)) => break Some(code),
                Err(RecvError::Lagged(skipped)) => debug!("Fell behind by {} events", skipped),
                Err(RecvError::Closed) => break None,
            }
        }
    };

    println!("Stopping capture...");
    recorder.stop().map_err(|code| report(code.into()))?;

    let elapsed = started.elapsed();
    let stats = recorder.stats();
    println!("\nSummary:");
    println!("  Elapsed:          {:.1}s", elapsed.as_secs_f64());
    println!("  Frames delivered: {}", stats.frames_delivered);
    println!(
        "  Average rate:     {:.1} fps",
        stats.frames_delivered as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("  Samples read:     {} ({} skipped)", stats.samples_read, stats.samples_skipped);
    if let Some(frame) = last_frame {
        let pts = frame
            .pts
            .map(|pts| format!("{:.3}s", recorder.time_base().to_seconds(pts)))
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  Last frame:       {}x{} {} ({} bytes, pts {})",
            frame.width,
            frame.height,
            frame.format,
            frame.byte_len(),
            pts
        );
    }

    recorder.teardown();

    match failure {
        Some(code) => Err(report(code.into()).context("Capture ended with an error")),
        None => {
            println!("Capture stopped.");
            Ok(())
        }
    }
}
