//! Hardware-free capture backend
//!
//! Produces a moving BGRA gradient of the requested size at the requested
//! frame rate. Useful for exercising the recorder on machines without a
//! screen-grab device, and as the CLI fallback when built without FFmpeg.

use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::{BackendError, CaptureBackend, CaptureSource, DecoderOpenError, Sample, SampleDecoder};
use crate::types::{CaptureOptions, DecodedFrame, MediaKind, PixelFormat, StreamInfo, TimeBase};

/// Codec name reported for the synthetic video stream
pub const SYNTHETIC_CODEC: &str = "rawvideo";

/// Backend producing a test pattern
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    frame_limit: Option<u64>,
    paced: bool,
}

impl SyntheticBackend {
    /// Create a paced, endless synthetic backend
    pub fn new() -> Self {
        Self {
            frame_limit: None,
            paced: true,
        }
    }

    /// Fail reads after `limit` samples, like a device that went away
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Deliver samples as fast as they are read instead of at the frame rate
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SyntheticBackend {
    type Source = SyntheticSource;

    fn open(&mut self, options: &CaptureOptions) -> Result<SyntheticSource, BackendError> {
        let (width, height) = options
            .dimensions()
            .ok_or_else(|| BackendError::new(format!("bad video_size {:?}", options.video_size)))?;

        let framerate = options.framerate.max(1);
        let time_base_den = i32::try_from(framerate)
            .map_err(|_| BackendError::new(format!("framerate {} out of range", framerate)))?;

        debug!(
            "Opening synthetic source {}x{} @ {}fps",
            width, height, framerate
        );

        Ok(SyntheticSource {
            width,
            height,
            framerate,
            time_base: TimeBase::new(1, time_base_den),
            frame_limit: self.frame_limit,
            paced: self.paced,
            sequence: 0,
            next_deadline: None,
        })
    }
}

/// An open synthetic source
#[derive(Debug)]
pub struct SyntheticSource {
    width: u32,
    height: u32,
    framerate: u32,
    time_base: TimeBase,
    frame_limit: Option<u64>,
    paced: bool,
    sequence: u64,
    next_deadline: Option<Instant>,
}

impl SyntheticSource {
    fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.framerate
    }
}

impl CaptureSource for SyntheticSource {
    type Sample = SyntheticSample;
    type Decoder = SyntheticDecoder;

    fn probe_streams(&mut self) -> Result<Vec<StreamInfo>, BackendError> {
        Ok(vec![StreamInfo {
            index: 0,
            kind: MediaKind::Video,
            time_base: self.time_base,
            start_time: Some(0),
            codec: SYNTHETIC_CODEC.to_string(),
        }])
    }

    fn open_decoder(&mut self, stream: &StreamInfo) -> Result<SyntheticDecoder, DecoderOpenError> {
        if stream.codec != SYNTHETIC_CODEC {
            return Err(DecoderOpenError::NotFound(stream.codec.clone()));
        }
        Ok(SyntheticDecoder {
            width: self.width,
            height: self.height,
        })
    }

    fn read_sample(&mut self) -> Result<SyntheticSample, BackendError> {
        if let Some(limit) = self.frame_limit {
            if self.sequence >= limit {
                return Err(BackendError::new(format!(
                    "synthetic source exhausted after {} frames",
                    limit
                )));
            }
        }

        if self.paced {
            let interval = self.frame_interval();
            let deadline = self.next_deadline.unwrap_or_else(Instant::now);
            let now = Instant::now();
            if deadline > now {
                std::thread::sleep(deadline - now);
            }
            // Do not try to catch up after a slow consumer
            self.next_deadline = Some(deadline.max(now) + interval);
        }

        let sample = SyntheticSample {
            stream_index: 0,
            sequence: self.sequence,
        };
        self.sequence += 1;
        trace!("Synthetic sample {}", sample.sequence);
        Ok(sample)
    }
}

/// A synthetic sample: just a sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticSample {
    stream_index: usize,
    sequence: u64,
}

impl SyntheticSample {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Sample for SyntheticSample {
    fn stream_index(&self) -> usize {
        self.stream_index
    }
}

/// Renders the gradient for a sample
#[derive(Debug)]
pub struct SyntheticDecoder {
    width: u32,
    height: u32,
}

impl SampleDecoder for SyntheticDecoder {
    type Sample = SyntheticSample;

    fn decode(
        &mut self,
        sample: &SyntheticSample,
        frame: &mut DecodedFrame,
        deliver: &mut dyn FnMut(&DecodedFrame),
    ) -> Result<usize, BackendError> {
        let (width, height) = (self.width, self.height);
        let shift = sample.sequence % 256;

        frame.width = width;
        frame.height = height;
        frame.format = PixelFormat::Bgra;
        frame.pts = Some(sample.sequence as i64);
        frame.reset_planes(1);

        let plane = &mut frame.planes[0];
        plane.stride = width as usize * 4;
        plane.data.reserve(plane.stride * height as usize);
        for y in 0..height {
            for x in 0..width {
                plane
                    .data
                    .extend_from_slice(&gradient_pixel(x, y, width, height, shift));
            }
        }

        deliver(frame);
        Ok(1)
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Bgra
    }
}

/// BGRA value of the pattern at (x, y), scrolled by `shift`
fn gradient_pixel(x: u32, y: u32, width: u32, height: u32, shift: u64) -> [u8; 4] {
    let r = (u64::from(x) * 255 / u64::from(width.max(1)) + shift) % 256;
    let g = u64::from(y) * 255 / u64::from(height.max(1)) % 256;
    let b = shift * 3 % 256;
    [b as u8, g as u8, r as u8, 255]
}
