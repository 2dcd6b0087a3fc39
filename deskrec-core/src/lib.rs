//! deskrec Core Library
//!
//! Captures a rectangular desktop region at a fixed frame rate, decodes the
//! captured stream, and delivers frames to callbacks from a dedicated
//! background thread.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐ init  ┌────────────────┐ start ┌──────────────────┐
//! │   Recorder    │──────▶│ CaptureSession │──────▶│   capture loop   │──▶ on_data / on_error
//! │ (lifecycle)   │       │ (source+codec) │       │ (own thread)     │
//! └───────────────┘       └────────────────┘       └──────────────────┘
//!                                 ▲
//!                                 │ CaptureBackend (FFmpeg, synthetic, ...)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use deskrec_core::{backend::SyntheticBackend, CaptureRegion, FrameRate, Recorder};
//!
//! let mut recorder = Recorder::new(SyntheticBackend::new());
//! recorder.set_on_data(|frame| println!("frame {}x{} pts={:?}", frame.width, frame.height, frame.pts));
//! recorder.set_on_error(|code| eprintln!("capture failed: {}", code));
//!
//! recorder.init(CaptureRegion::new(0, 0, 1920, 1080)?, FrameRate::new(30)?)?;
//! recorder.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(1));
//! recorder.stop()?;
//! # Ok::<(), deskrec_core::DeskrecError>(())
//! ```

pub mod backend;
pub mod capture;
pub mod config;
pub mod error;
pub mod events;
pub mod recorder;
pub mod types;

pub use backend::{CaptureBackend, SyntheticBackend};
pub use config::{BackendKind, ConfigFile};
pub use error::{DeskrecError, ErrorCode, Result};
pub use events::CaptureEvent;
pub use recorder::{Recorder, RecorderStats};
pub use types::{
    CaptureOptions, CaptureRegion, DecodedFrame, FrameRate, PixelFormat, RecorderState, TimeBase,
};
