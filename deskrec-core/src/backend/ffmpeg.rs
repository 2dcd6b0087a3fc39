//! FFmpeg capture backend
//!
//! Opens a libavdevice screen-grab input (dshow, gdigrab, x11grab,
//! avfoundation) and decodes its packets with libavcodec.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::{codec, decoder, media, Dictionary, Packet};
use tracing::{debug, info, trace};

use super::{BackendError, CaptureBackend, CaptureSource, DecoderOpenError, Sample, SampleDecoder};
use crate::error::{DeskrecError, Result};
use crate::types::{CaptureOptions, DecodedFrame, MediaKind, PixelFormat, StreamInfo, TimeBase};

/// Which libavdevice input to open, and with what URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSpec {
    /// Input format name (e.g. "dshow", "x11grab")
    pub format: String,
    /// Device URL passed to the input format
    pub url: String,
}

impl DeviceSpec {
    pub fn new(format: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            url: url.into(),
        }
    }

    /// The usual screen-grab device on this platform
    pub fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            Self::new("dshow", "video=screen-capture-recorder")
        } else if cfg!(target_os = "macos") {
            Self::new("avfoundation", "1:none")
        } else {
            let display = std::env::var("DISPLAY").unwrap_or_else(|_| ":0.0".to_string());
            Self::new("x11grab", display)
        }
    }
}

impl Default for DeviceSpec {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Name and description of a libavdevice video input
#[derive(Debug, Clone)]
pub struct InputDeviceInfo {
    pub name: String,
    pub description: String,
}

/// List the video input devices FFmpeg was built with
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>> {
    ffmpeg::init().map_err(|e| DeskrecError::backend(format!("FFmpeg init failed: {}", e)))?;

    Ok(ffmpeg::device::input::video()
        .map(|fmt| InputDeviceInfo {
            name: fmt.name().to_string(),
            description: fmt.description().to_string(),
        })
        .collect())
}

fn find_input_format(name: &str) -> Option<ffmpeg::format::Input> {
    ffmpeg::device::input::video().find(|fmt| fmt.name() == name)
}

/// Backend capturing through libavdevice
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    device: DeviceSpec,
}

impl FfmpegBackend {
    pub fn new(device: DeviceSpec) -> Self {
        Self { device }
    }

    pub fn device(&self) -> &DeviceSpec {
        &self.device
    }
}

impl CaptureBackend for FfmpegBackend {
    type Source = FfmpegSource;

    fn open(&mut self, options: &CaptureOptions) -> std::result::Result<FfmpegSource, BackendError> {
        ffmpeg::init().map_err(|e| BackendError::new(format!("FFmpeg init failed: {}", e)))?;

        let input_format = find_input_format(&self.device.format).ok_or_else(|| {
            BackendError::new(format!("input device {} not available", self.device.format))
        })?;

        let mut dict = Dictionary::new();
        for (key, value) in options.entries() {
            dict.set(key, &value);
        }

        info!(
            "Opening {} input {:?} ({} @ {}fps)",
            self.device.format, self.device.url, options.video_size, options.framerate
        );

        let context = ffmpeg::format::open_with(
            &self.device.url,
            &ffmpeg::format::format::Format::Input(input_format),
            dict,
        )
        .map_err(|e| BackendError::new(format!("avformat_open_input: {}", e)))?;

        match context {
            ffmpeg::format::context::Context::Input(input) => Ok(FfmpegSource { input }),
            ffmpeg::format::context::Context::Output(_) => {
                Err(BackendError::new("device opened as an output context"))
            }
        }
    }
}

/// An open libavformat input
pub struct FfmpegSource {
    input: ffmpeg::format::context::Input,
}

impl CaptureSource for FfmpegSource {
    type Sample = FfmpegSample;
    type Decoder = FfmpegDecoder;

    fn probe_streams(&mut self) -> std::result::Result<Vec<StreamInfo>, BackendError> {
        let streams = self
            .input
            .streams()
            .map(|stream| {
                let params = stream.parameters();
                let kind = match params.medium() {
                    media::Type::Video => MediaKind::Video,
                    media::Type::Audio => MediaKind::Audio,
                    _ => MediaKind::Other,
                };
                let time_base = stream.time_base();
                let start_time = match stream.start_time() {
                    i64::MIN => None,
                    ts => Some(ts),
                };
                StreamInfo {
                    index: stream.index(),
                    kind,
                    time_base: TimeBase::new(time_base.numerator(), time_base.denominator()),
                    start_time,
                    codec: format!("{:?}", params.id()).to_lowercase(),
                }
            })
            .collect::<Vec<_>>();

        if streams.is_empty() {
            return Err(BackendError::new("input reports no streams"));
        }
        debug!("Probed {} stream(s)", streams.len());
        Ok(streams)
    }

    fn open_decoder(
        &mut self,
        stream: &StreamInfo,
    ) -> std::result::Result<FfmpegDecoder, DecoderOpenError> {
        let av_stream = self
            .input
            .stream(stream.index)
            .ok_or_else(|| DecoderOpenError::NotFound(stream.codec.clone()))?;
        let params = av_stream.parameters();

        let codec = decoder::find(params.id())
            .ok_or_else(|| DecoderOpenError::NotFound(stream.codec.clone()))?;

        let decoder = codec::context::Context::from_parameters(params)
            .and_then(|ctx| ctx.decoder().open_as(codec))
            .and_then(|opened| opened.video())
            .map_err(|e| DecoderOpenError::Open(e.to_string()))?;

        debug!(
            "Decoder {} opened: {}x{} {:?}",
            stream.codec,
            decoder.width(),
            decoder.height(),
            decoder.format()
        );

        Ok(FfmpegDecoder {
            decoder,
            picture: Video::empty(),
        })
    }

    fn read_sample(&mut self) -> std::result::Result<FfmpegSample, BackendError> {
        let mut packet = Packet::empty();
        packet
            .read(&mut self.input)
            .map_err(|e| BackendError::new(format!("av_read_frame: {}", e)))?;
        Ok(FfmpegSample(packet))
    }
}

/// A demuxed packet
pub struct FfmpegSample(Packet);

impl Sample for FfmpegSample {
    fn stream_index(&self) -> usize {
        self.0.stream()
    }
}

/// libavcodec video decoder
pub struct FfmpegDecoder {
    decoder: decoder::Video,
    picture: Video,
}

impl SampleDecoder for FfmpegDecoder {
    type Sample = FfmpegSample;

    fn decode(
        &mut self,
        sample: &FfmpegSample,
        frame: &mut DecodedFrame,
        deliver: &mut dyn FnMut(&DecodedFrame),
    ) -> std::result::Result<usize, BackendError> {
        let mut delivered = 0;

        loop {
            match self.decoder.send_packet(&sample.0) {
                Ok(()) => break,
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    // Output is full; drain it, then the packet fits
                    let drained = self.receive_pictures(frame, deliver)?;
                    if drained == 0 {
                        return Err(BackendError::new(
                            "send_packet: decoder refuses input but has no output",
                        ));
                    }
                    delivered += drained;
                }
                Err(e) => return Err(BackendError::new(format!("send_packet: {}", e))),
            }
        }

        delivered += self.receive_pictures(frame, deliver)?;
        Ok(delivered)
    }

    fn pixel_format(&self) -> PixelFormat {
        pixel_format_from_av(self.decoder.format())
    }
}

impl FfmpegDecoder {
    /// Hand over every picture the decoder has ready
    fn receive_pictures(
        &mut self,
        frame: &mut DecodedFrame,
        deliver: &mut dyn FnMut(&DecodedFrame),
    ) -> std::result::Result<usize, BackendError> {
        let mut count = 0;
        loop {
            match self.decoder.receive_frame(&mut self.picture) {
                Ok(()) => {
                    copy_picture(&self.picture, frame);
                    trace!("Decoded picture pts={:?}", frame.pts);
                    deliver(frame);
                    count += 1;
                }
                Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                    // Need more input
                    return Ok(count);
                }
                Err(ffmpeg::Error::Eof) => return Ok(count),
                Err(e) => return Err(BackendError::new(format!("receive_frame: {}", e))),
            }
        }
    }
}

fn copy_picture(picture: &Video, frame: &mut DecodedFrame) {
    frame.width = picture.width();
    frame.height = picture.height();
    frame.format = pixel_format_from_av(picture.format());
    frame.pts = picture.pts();
    frame.reset_planes(picture.planes());
    for (index, plane) in frame.planes.iter_mut().enumerate() {
        plane.stride = picture.stride(index);
        plane.data.extend_from_slice(picture.data(index));
    }
}

/// Convert an FFmpeg pixel format
fn pixel_format_from_av(pixel: Pixel) -> PixelFormat {
    match pixel {
        Pixel::BGRA => PixelFormat::Bgra,
        Pixel::BGRZ => PixelFormat::Bgr0,
        Pixel::RGBA => PixelFormat::Rgba,
        Pixel::RGB24 => PixelFormat::Rgb24,
        Pixel::BGR24 => PixelFormat::Bgr24,
        Pixel::YUV420P => PixelFormat::Yuv420p,
        Pixel::YUYV422 => PixelFormat::Yuyv422,
        Pixel::UYVY422 => PixelFormat::Uyvy422,
        Pixel::NV12 => PixelFormat::Nv12,
        other => PixelFormat::Other(format!("{:?}", other).to_lowercase()),
    }
}
