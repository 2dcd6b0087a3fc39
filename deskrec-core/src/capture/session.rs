//! Capture session: an open source, its video stream and the bound decoder

use tracing::{debug, error, info};

use crate::backend::{CaptureBackend, CaptureSource, DecoderOpenError, SampleDecoder};
use crate::error::ErrorCode;
use crate::types::{
    CaptureOptions, CaptureRegion, FrameRate, MediaKind, PixelFormat, StreamInfo, TimeBase,
};

/// Snapshot of an open session's metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// The video stream being decoded
    pub stream: StreamInfo,
    /// Pixel layout the decoder produces
    pub pixel_format: PixelFormat,
    /// Options the source was opened with
    pub options: CaptureOptions,
}

/// Owns the backend source, the identified video stream and its decoder
///
/// A session is either fully open or fully closed. Dropping it closes it.
pub struct CaptureSession<S: CaptureSource> {
    source: Option<S>,
    decoder: Option<S::Decoder>,
    info: Option<SessionInfo>,
}

impl<S: CaptureSource> CaptureSession<S> {
    /// Create a closed session
    pub fn new() -> Self {
        Self {
            source: None,
            decoder: None,
            info: None,
        }
    }

    /// Open the backend's capture source for `region` at `fps`
    ///
    /// Calling this on an open session does nothing. On failure the session
    /// is closed again before the error is returned.
    pub fn open<B>(&mut self, backend: &mut B, region: &CaptureRegion, fps: FrameRate) -> Result<(), ErrorCode>
    where
        B: CaptureBackend<Source = S>,
    {
        if self.is_open() {
            return Ok(());
        }

        let result = self.try_open(backend, region, fps);
        if let Err(code) = result {
            error!("Failed to open capture session: {}", code);
            self.close();
        }
        result
    }

    fn try_open<B>(&mut self, backend: &mut B, region: &CaptureRegion, fps: FrameRate) -> Result<(), ErrorCode>
    where
        B: CaptureBackend<Source = S>,
    {
        let options = CaptureOptions::new(region, fps);
        debug!("Capture options: {:?}", options.entries());

        let source = self.source.insert(backend.open(&options).map_err(|e| {
            error!("Capture input could not be opened: {}", e);
            ErrorCode::OpenInputFailed
        })?);

        let streams = source.probe_streams().map_err(|e| {
            error!("Stream probing failed: {}", e);
            ErrorCode::FindStreamFailed
        })?;

        let stream = streams
            .into_iter()
            .find(|s| s.kind == MediaKind::Video)
            .ok_or_else(|| {
                error!("Capture input has no video stream");
                ErrorCode::FindStreamFailed
            })?;

        let decoder = source.open_decoder(&stream).map_err(|e| {
            error!("Decoder for stream {} unavailable: {}", stream.index, e);
            match e {
                DecoderOpenError::NotFound(_) => ErrorCode::FindDecoderFailed,
                DecoderOpenError::Open(_) => ErrorCode::OpenCodecFailed,
            }
        })?;
        let decoder = self.decoder.insert(decoder);

        let info = SessionInfo {
            pixel_format: decoder.pixel_format(),
            stream,
            options,
        };
        info!(
            "Capture session open: {} region {} @ {}, stream {} ({}), time base {}",
            info.options.video_size,
            region,
            fps,
            info.stream.index,
            info.stream.codec,
            info.stream.time_base
        );
        self.info = Some(info);

        Ok(())
    }

    /// Close the decoder, then the source. Safe on a closed session.
    pub fn close(&mut self) {
        let was_open = self.is_open();
        self.decoder = None;
        self.source = None;
        self.info = None;
        if was_open {
            debug!("Capture session closed");
        }
    }

    /// Whether the session holds an open source and decoder
    pub fn is_open(&self) -> bool {
        self.source.is_some() && self.decoder.is_some() && self.info.is_some()
    }

    /// Metadata snapshot, if open
    pub fn info(&self) -> Option<&SessionInfo> {
        self.info.as_ref()
    }

    /// Time base of the video stream, `1/90000` if not open
    pub fn time_base(&self) -> TimeBase {
        self.info
            .as_ref()
            .map(|i| i.stream.time_base)
            .unwrap_or(TimeBase::DEFAULT)
    }

    /// Start time of the video stream, if open and known
    pub fn start_time(&self) -> Option<i64> {
        self.info.as_ref().and_then(|i| i.stream.start_time)
    }

    /// Pixel format of decoded pictures, if open
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.info.as_ref().map(|i| i.pixel_format.clone())
    }

    /// Index of the video stream, if open
    pub fn stream_index(&self) -> Option<usize> {
        self.info.as_ref().map(|i| i.stream.index)
    }

    /// Options the source was opened with, if open
    pub fn options(&self) -> Option<&CaptureOptions> {
        self.info.as_ref().map(|i| &i.options)
    }

    /// Source, decoder and target stream index, for the capture loop
    pub(crate) fn parts_mut(&mut self) -> Option<(&mut S, &mut S::Decoder, usize)> {
        let index = self.stream_index()?;
        match (self.source.as_mut(), self.decoder.as_mut()) {
            (Some(source), Some(decoder)) => Some((source, decoder, index)),
            _ => None,
        }
    }
}

impl<S: CaptureSource> Default for CaptureSession<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CaptureSource> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}
