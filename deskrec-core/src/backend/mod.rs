//! Capture-and-decode backend seam
//!
//! The recorder never grabs pixels itself. It drives a backend through three
//! small traits:
//!
//! ```text
//! CaptureBackend::open(options) ──▶ CaptureSource ──probe_streams──▶ [StreamInfo]
//!                                        │
//!                                        ├── open_decoder(stream) ──▶ SampleDecoder
//!                                        │
//!                                        └── read_sample() ──▶ Sample ──decode──▶ DecodedFrame
//! ```
//!
//! Dropping a source or decoder closes it.

pub mod synthetic;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

pub use synthetic::SyntheticBackend;

#[cfg(feature = "ffmpeg")]
pub use self::ffmpeg::{list_input_devices, DeviceSpec, FfmpegBackend};

use thiserror::Error;

use crate::types::{CaptureOptions, DecodedFrame, PixelFormat, StreamInfo};

/// Failure reported by a backend, carrying its own description
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Why a decoder could not be bound to a stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderOpenError {
    /// No decoder exists for the stream's codec
    #[error("no decoder for codec {0}")]
    NotFound(String),
    /// A decoder exists but refused to open
    #[error("decoder failed to open: {0}")]
    Open(String),
}

/// Opens capture sources
pub trait CaptureBackend: Send {
    /// An open source
    type Source: CaptureSource;

    /// Open the backend's screen-capture source with the given options
    fn open(&mut self, options: &CaptureOptions) -> Result<Self::Source, BackendError>;
}

/// An open capture source (demuxer handle)
///
/// Moved onto the capture thread while the recorder runs, hence `Send + 'static`.
pub trait CaptureSource: Send + 'static {
    /// Compressed unit read from the source; dropping it releases its buffer
    type Sample: Sample;
    /// Decoder bound to one of this source's streams
    type Decoder: SampleDecoder<Sample = Self::Sample>;

    /// Enumerate the streams of the source
    fn probe_streams(&mut self) -> Result<Vec<StreamInfo>, BackendError>;

    /// Bind a decoder to `stream`
    fn open_decoder(&mut self, stream: &StreamInfo) -> Result<Self::Decoder, DecoderOpenError>;

    /// Read the next sample. Blocks until one is available.
    fn read_sample(&mut self) -> Result<Self::Sample, BackendError>;
}

/// A compressed sample
pub trait Sample {
    /// Index of the stream the sample belongs to
    fn stream_index(&self) -> usize;
}

/// Turns samples into pictures
pub trait SampleDecoder: Send + 'static {
    type Sample: Sample;

    /// Decode one sample, filling `frame` and calling `deliver` once for
    /// every picture that becomes available.
    ///
    /// A sample may yield no picture (the decoder needs more input) or
    /// several (pictures buffered from earlier samples). Returns how many
    /// pictures were delivered.
    fn decode(
        &mut self,
        sample: &Self::Sample,
        frame: &mut DecodedFrame,
        deliver: &mut dyn FnMut(&DecodedFrame),
    ) -> Result<usize, BackendError>;

    /// Pixel layout of decoded pictures
    fn pixel_format(&self) -> PixelFormat;
}
