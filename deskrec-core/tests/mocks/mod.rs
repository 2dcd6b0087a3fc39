//! Mock infrastructure for testing
//!
//! A scripted capture backend that can fail at any step, counts how often
//! sources and decoders are opened and closed, and records the options it
//! was opened with.

#![allow(dead_code)]

use deskrec_core::backend::{
    BackendError, CaptureBackend, CaptureSource, DecoderOpenError, Sample, SampleDecoder,
};
use deskrec_core::types::{
    CaptureOptions, DecodedFrame, MediaKind, PixelFormat, Plane, StreamInfo, TimeBase,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stream index of the mock video stream
pub const VIDEO_STREAM: usize = 1;
/// Stream index of the mock audio stream
pub const AUDIO_STREAM: usize = 0;

/// What the mock backend should do
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// `open` fails
    pub fail_open: bool,
    /// `probe_streams` fails
    pub fail_probe: bool,
    /// Only an audio stream is reported
    pub no_video_stream: bool,
    /// No decoder exists for the video codec
    pub missing_decoder: bool,
    /// The decoder exists but fails to open
    pub fail_codec_open: bool,
    /// Reads fail once this many samples have been read
    pub fail_read_after: Option<u64>,
    /// Decoding the video sample with this sequence number fails
    pub fail_decode_at: Option<u64>,
    /// Every other sample belongs to the audio stream
    pub interleave_audio: bool,
    /// Every other video sample yields no picture
    pub partial_pictures: bool,
    /// Each video sample yields a second, previously buffered picture
    pub burst_pictures: bool,
    /// Delay before each read returns
    pub read_delay: Duration,
}

/// Open/close bookkeeping shared with every source and decoder
#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub decoder_opens: AtomicUsize,
    pub decoder_closes: AtomicUsize,
    pub reads: AtomicU64,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn decoder_opens(&self) -> usize {
        self.decoder_opens.load(Ordering::SeqCst)
    }

    pub fn decoder_closes(&self) -> usize {
        self.decoder_closes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Nothing opened is still open
    pub fn all_closed(&self) -> bool {
        self.opens() == self.closes() && self.decoder_opens() == self.decoder_closes()
    }
}

/// Scripted capture backend
pub struct MockBackend {
    pub script: Script,
    pub counters: Arc<Counters>,
    pub last_options: Arc<Mutex<Option<CaptureOptions>>>,
}

impl MockBackend {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            counters: Arc::new(Counters::default()),
            last_options: Arc::new(Mutex::new(None)),
        }
    }

    /// A backend that never fails
    pub fn healthy() -> Self {
        Self::new(Script::default())
    }
}

impl CaptureBackend for MockBackend {
    type Source = MockSource;

    fn open(&mut self, options: &CaptureOptions) -> Result<MockSource, BackendError> {
        *self.last_options.lock() = Some(options.clone());
        if self.script.fail_open {
            return Err(BackendError::new("device busy"));
        }
        self.counters.opens.fetch_add(1, Ordering::SeqCst);

        let (width, height) = options.dimensions().unwrap_or((0, 0));
        Ok(MockSource {
            script: self.script.clone(),
            counters: self.counters.clone(),
            width,
            height,
            sequence: 0,
        })
    }
}

pub struct MockSource {
    script: Script,
    counters: Arc<Counters>,
    width: u32,
    height: u32,
    sequence: u64,
}

impl CaptureSource for MockSource {
    type Sample = MockSample;
    type Decoder = MockDecoder;

    fn probe_streams(&mut self) -> Result<Vec<StreamInfo>, BackendError> {
        if self.script.fail_probe {
            return Err(BackendError::new("probe timed out"));
        }

        let mut streams = vec![StreamInfo {
            index: AUDIO_STREAM,
            kind: MediaKind::Audio,
            time_base: TimeBase::new(1, 48000),
            start_time: None,
            codec: "pcm_s16le".to_string(),
        }];
        if !self.script.no_video_stream {
            streams.push(StreamInfo {
                index: VIDEO_STREAM,
                kind: MediaKind::Video,
                time_base: TimeBase::new(1, 1000),
                start_time: Some(1234),
                codec: "bmp".to_string(),
            });
        }
        Ok(streams)
    }

    fn open_decoder(&mut self, stream: &StreamInfo) -> Result<MockDecoder, DecoderOpenError> {
        if self.script.missing_decoder {
            return Err(DecoderOpenError::NotFound(stream.codec.clone()));
        }
        if self.script.fail_codec_open {
            return Err(DecoderOpenError::Open("bad extradata".to_string()));
        }
        self.counters.decoder_opens.fetch_add(1, Ordering::SeqCst);
        Ok(MockDecoder {
            script: self.script.clone(),
            counters: self.counters.clone(),
            width: self.width,
            height: self.height,
            video_samples: 0,
        })
    }

    fn read_sample(&mut self) -> Result<MockSample, BackendError> {
        if !self.script.read_delay.is_zero() {
            std::thread::sleep(self.script.read_delay);
        }
        if let Some(limit) = self.script.fail_read_after {
            if self.sequence >= limit {
                return Err(BackendError::new("device lost"));
            }
        }

        let stream_index = if self.script.interleave_audio && self.sequence % 2 == 1 {
            AUDIO_STREAM
        } else {
            VIDEO_STREAM
        };
        let sample = MockSample {
            stream_index,
            sequence: self.sequence,
        };
        self.sequence += 1;
        self.counters.reads.fetch_add(1, Ordering::SeqCst);
        Ok(sample)
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MockSample {
    stream_index: usize,
    sequence: u64,
}

impl Sample for MockSample {
    fn stream_index(&self) -> usize {
        self.stream_index
    }
}

pub struct MockDecoder {
    script: Script,
    counters: Arc<Counters>,
    width: u32,
    height: u32,
    video_samples: u64,
}

impl SampleDecoder for MockDecoder {
    type Sample = MockSample;

    fn decode(
        &mut self,
        sample: &MockSample,
        frame: &mut DecodedFrame,
        deliver: &mut dyn FnMut(&DecodedFrame),
    ) -> Result<usize, BackendError> {
        assert_eq!(sample.stream_index, VIDEO_STREAM, "audio sample reached the decoder");

        if self.script.fail_decode_at == Some(sample.sequence) {
            return Err(BackendError::new("corrupt sample"));
        }

        let index = self.video_samples;
        self.video_samples += 1;
        if self.script.partial_pictures && index % 2 == 1 {
            return Ok(0);
        }

        let pts = sample.sequence as i64;
        self.fill(frame, pts);
        deliver(frame);
        if !self.script.burst_pictures {
            return Ok(1);
        }

        self.fill(frame, pts + BURST_PTS_OFFSET);
        deliver(frame);
        Ok(2)
    }

    fn pixel_format(&self) -> PixelFormat {
        PixelFormat::Bgr0
    }
}

/// Added to the sample's pts for the extra picture of a burst
pub const BURST_PTS_OFFSET: i64 = 1000;

impl MockDecoder {
    fn fill(&self, frame: &mut DecodedFrame, pts: i64) {
        frame.width = self.width;
        frame.height = self.height;
        frame.format = PixelFormat::Bgr0;
        frame.pts = Some(pts);
        frame.planes = vec![Plane {
            data: vec![pts as u8; 4],
            stride: 4,
        }];
    }
}

impl Drop for MockDecoder {
    fn drop(&mut self) {
        self.counters.decoder_closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Callback recorder: what the capture thread delivered, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Frame(Option<i64>),
    Error(deskrec_core::ErrorCode),
}

/// Shared log of deliveries
pub type DeliveryLog = Arc<Mutex<Vec<Delivery>>>;

/// Install logging callbacks on a recorder
pub fn capture_deliveries<B: CaptureBackend>(recorder: &deskrec_core::Recorder<B>) -> DeliveryLog {
    let log: DeliveryLog = Arc::new(Mutex::new(Vec::new()));
    let data_log = log.clone();
    recorder.set_on_data(move |frame| data_log.lock().push(Delivery::Frame(frame.pts)));
    let error_log = log.clone();
    recorder.set_on_error(move |code| error_log.lock().push(Delivery::Error(code)));
    log
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskrec_core::{CaptureRegion, FrameRate};

    fn options() -> CaptureOptions {
        CaptureOptions::new(
            &CaptureRegion::new(0, 0, 4, 4).unwrap(),
            FrameRate::new(10).unwrap(),
        )
    }

    #[test]
    fn test_mock_counts_open_and_close() {
        let mut backend = MockBackend::healthy();
        let source = backend.open(&options()).unwrap();
        assert_eq!(backend.counters.opens(), 1);
        drop(source);
        assert!(backend.counters.all_closed());
    }

    #[test]
    fn test_mock_interleaves_audio() {
        let mut backend = MockBackend::new(Script {
            interleave_audio: true,
            ..Script::default()
        });
        let mut source = backend.open(&options()).unwrap();
        assert_eq!(source.read_sample().unwrap().stream_index(), VIDEO_STREAM);
        assert_eq!(source.read_sample().unwrap().stream_index(), AUDIO_STREAM);
    }
}
