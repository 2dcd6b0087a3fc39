//! Core types for deskrec
//!
//! These types describe what to capture, how the backend is configured, and
//! what comes out of the decoder.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

use crate::error::{DeskrecError, Result};

/// Rectangular screen area in pixel coordinates
///
/// Always satisfies `right > left` and `bottom > top`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRegion")]
pub struct CaptureRegion {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

#[derive(Deserialize)]
struct RawRegion {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl TryFrom<RawRegion> for CaptureRegion {
    type Error = DeskrecError;

    fn try_from(raw: RawRegion) -> Result<Self> {
        Self::new(raw.left, raw.top, raw.right, raw.bottom)
    }
}

impl CaptureRegion {
    /// Create a region from its edges
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Result<Self> {
        if right <= left || bottom <= top {
            return Err(DeskrecError::InvalidRegion {
                left,
                top,
                right,
                bottom,
            });
        }
        Ok(Self {
            left,
            top,
            right,
            bottom,
        })
    }

    /// Create a region from an origin and a size
    pub fn from_origin_size(x: i32, y: i32, width: u32, height: u32) -> Result<Self> {
        let right = i64::from(x) + i64::from(width);
        let bottom = i64::from(y) + i64::from(height);
        let right = i32::try_from(right).map_err(|_| DeskrecError::InvalidRegion {
            left: x,
            top: y,
            right: i32::MAX,
            bottom: y,
        })?;
        let bottom = i32::try_from(bottom).map_err(|_| DeskrecError::InvalidRegion {
            left: x,
            top: y,
            right,
            bottom: i32::MAX,
        })?;
        Self::new(x, y, right, bottom)
    }

    pub fn left(&self) -> i32 {
        self.left
    }

    pub fn top(&self) -> i32 {
        self.top
    }

    pub fn right(&self) -> i32 {
        self.right
    }

    pub fn bottom(&self) -> i32 {
        self.bottom
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.right.abs_diff(self.left)
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.bottom.abs_diff(self.top)
    }
}

impl std::fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}+{}+{}",
            self.width(),
            self.height(),
            self.left,
            self.top
        )
    }
}

/// Target capture rate in frames per second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FrameRate(NonZeroU32);

impl FrameRate {
    /// 30 frames per second
    pub const DEFAULT: FrameRate = FrameRate(NonZeroU32::new(30).unwrap());

    /// Create a frame rate, rejecting zero
    pub fn new(fps: u32) -> Result<Self> {
        NonZeroU32::new(fps)
            .map(Self)
            .ok_or(DeskrecError::InvalidFrameRate)
    }

    /// Frames per second
    pub fn get(&self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = DeskrecError;

    fn try_from(fps: u32) -> Result<Self> {
        Self::new(fps)
    }
}

impl From<FrameRate> for u32 {
    fn from(rate: FrameRate) -> u32 {
        rate.get()
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}fps", self.0)
    }
}

/// Options handed to the backend when opening the capture source
///
/// Built fresh for every `init` and never stored beyond the open session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOptions {
    /// Samples per second requested from the device
    pub framerate: u32,
    /// Horizontal origin of the region
    pub offset_x: i32,
    /// Vertical origin of the region
    pub offset_y: i32,
    /// Region size formatted as `"<width>x<height>"`
    pub video_size: String,
    /// Composite the pointer into captured frames
    pub draw_mouse: bool,
}

impl CaptureOptions {
    pub const FRAMERATE: &'static str = "framerate";
    pub const OFFSET_X: &'static str = "offset_x";
    pub const OFFSET_Y: &'static str = "offset_y";
    pub const VIDEO_SIZE: &'static str = "video_size";
    pub const DRAW_MOUSE: &'static str = "draw_mouse";

    /// Derive the options for a region and frame rate
    pub fn new(region: &CaptureRegion, fps: FrameRate) -> Self {
        Self {
            framerate: fps.get(),
            offset_x: region.left(),
            offset_y: region.top(),
            video_size: format!("{}x{}", region.width(), region.height()),
            draw_mouse: true,
        }
    }

    /// The key/value pairs as the backend receives them
    pub fn entries(&self) -> [(&'static str, String); 5] {
        [
            (Self::FRAMERATE, self.framerate.to_string()),
            (Self::OFFSET_X, self.offset_x.to_string()),
            (Self::OFFSET_Y, self.offset_y.to_string()),
            (Self::VIDEO_SIZE, self.video_size.clone()),
            (Self::DRAW_MOUSE, u8::from(self.draw_mouse).to_string()),
        ]
    }

    /// Parse `video_size` back into (width, height)
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.video_size.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    }
}

/// Rational unit mapping timestamps to seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    /// Fallback used whenever no stream is open
    pub const DEFAULT: TimeBase = TimeBase { num: 1, den: 90000 };

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Convert a timestamp in this time base to seconds
    pub fn to_seconds(&self, ts: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ts as f64 * f64::from(self.num) / f64::from(self.den)
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::fmt::Display for TimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Pixel layout of a decoded frame
///
/// Only the layouts screen-grab devices commonly produce are named; anything
/// else is carried through by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Bgra,
    Bgr0,
    Rgba,
    Rgb24,
    Bgr24,
    Yuv420p,
    Yuyv422,
    Uyvy422,
    Nv12,
    Other(String),
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, `None` for planar/subsampled ones
    pub fn packed_bytes_per_pixel(&self) -> Option<usize> {
        match self {
            Self::Bgra | Self::Bgr0 | Self::Rgba => Some(4),
            Self::Rgb24 | Self::Bgr24 => Some(3),
            Self::Yuyv422 | Self::Uyvy422 => Some(2),
            Self::Yuv420p | Self::Nv12 | Self::Other(_) => None,
        }
    }

    /// FFmpeg-style name
    pub fn name(&self) -> &str {
        match self {
            Self::Bgra => "bgra",
            Self::Bgr0 => "bgr0",
            Self::Rgba => "rgba",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Yuv420p => "yuv420p",
            Self::Yuyv422 => "yuyv422",
            Self::Uyvy422 => "uyvy422",
            Self::Nv12 => "nv12",
            Self::Other(name) => name,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Kind of stream exposed by a capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Other,
}

/// Description of one stream of an open capture source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Index of the stream within the source
    pub index: usize,
    /// What the stream carries
    pub kind: MediaKind,
    /// Timestamp unit of the stream
    pub time_base: TimeBase,
    /// First timestamp of the stream, if the source reports one
    pub start_time: Option<i64>,
    /// Codec name as reported by the backend
    pub codec: String,
}

/// One plane of decoded picture data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plane {
    /// Bytes of the plane, `stride * rows` long
    pub data: Vec<u8>,
    /// Bytes per row, including padding
    pub stride: usize,
}

/// A decoded picture
///
/// The capture loop owns one of these and reuses it between samples. The
/// data callback only borrows it; clone it to keep it past the callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel layout of `planes`
    pub format: PixelFormat,
    /// Presentation timestamp in the stream time base
    pub pts: Option<i64>,
    /// Picture planes
    pub planes: Vec<Plane>,
}

impl DecodedFrame {
    /// Total bytes across all planes
    pub fn byte_len(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// Resize to `count` planes, keeping existing allocations
    pub fn reset_planes(&mut self, count: usize) {
        self.planes.resize_with(count, Plane::default);
        for plane in &mut self.planes {
            plane.data.clear();
            plane.stride = 0;
        }
    }
}

/// Observable state of a recorder
///
/// A stopped recorder reports `Initialized`: it may be started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecorderState {
    #[default]
    Uninitialized,
    Initialized,
    Running,
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initialized => write!(f, "Initialized"),
            Self::Running => write!(f, "Running"),
        }
    }
}
