//! Error types for deskrec
//!
//! Two layers:
//! - [`ErrorCode`] is the closed set of lifecycle and runtime failures that the
//!   recorder reports, either as a return value or through the error callback.
//! - [`DeskrecError`] covers everything around the recorder: argument
//!   validation, configuration files and I/O.

use thiserror::Error;

/// Result type alias using DeskrecError
pub type Result<T> = std::result::Result<T, DeskrecError>;

/// Lifecycle and capture-loop failure kinds
///
/// Success is represented by `Ok(())`, so there is no "no error" variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorCode {
    /// `start` was called before a successful `init`
    #[error("recorder must be initialized before it can start")]
    NeedInit,

    /// The backend could not open the capture source
    #[error("failed to open capture input")]
    OpenInputFailed,

    /// Stream probing failed or the source has no video stream
    #[error("failed to find a video stream")]
    FindStreamFailed,

    /// No decoder is available for the video stream's codec
    #[error("failed to find a decoder for the video stream")]
    FindDecoderFailed,

    /// The decoder refused to initialize
    #[error("failed to open the video decoder")]
    OpenCodecFailed,

    /// Reading the next sample from the source failed
    #[error("failed to read a frame from the capture input")]
    ReadFrameFailed,

    /// Decoding a sample failed
    #[error("failed to decode a captured frame")]
    DecodeFrameFailed,
}

impl ErrorCode {
    /// Every code, in declaration order
    pub const ALL: [ErrorCode; 7] = [
        Self::NeedInit,
        Self::OpenInputFailed,
        Self::FindStreamFailed,
        Self::FindDecoderFailed,
        Self::OpenCodecFailed,
        Self::ReadFrameFailed,
        Self::DecodeFrameFailed,
    ];

    /// Stable snake_case name, suitable for logs and machine output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedInit => "need_init",
            Self::OpenInputFailed => "open_input_failed",
            Self::FindStreamFailed => "find_stream_failed",
            Self::FindDecoderFailed => "find_decoder_failed",
            Self::OpenCodecFailed => "open_codec_failed",
            Self::ReadFrameFailed => "read_frame_failed",
            Self::DecodeFrameFailed => "decode_frame_failed",
        }
    }

    /// Returned synchronously by `init`; the session is already torn down
    pub fn is_init_error(&self) -> bool {
        matches!(
            self,
            Self::OpenInputFailed
                | Self::FindStreamFailed
                | Self::FindDecoderFailed
                | Self::OpenCodecFailed
        )
    }

    /// Delivered through the error callback; fatal to the current run
    pub fn is_runtime_error(&self) -> bool {
        matches!(self, Self::ReadFrameFailed | Self::DecodeFrameFailed)
    }
}

/// Main error type for deskrec operations outside the recorder lifecycle
#[derive(Debug, Error)]
pub enum DeskrecError {
    /// A recorder lifecycle failure
    #[error("Recorder error: {0}")]
    Code(#[from] ErrorCode),

    /// Capture region with non-positive width or height
    #[error("Invalid capture region ({left}, {top}) - ({right}, {bottom}): right must exceed left and bottom must exceed top")]
    InvalidRegion {
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
    },

    /// Frame rate of zero
    #[error("Invalid frame rate: must be a positive number of frames per second")]
    InvalidFrameRate,

    /// Capture backend failure outside the lifecycle (e.g. device listing)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DeskrecError>,
    },
}

impl DeskrecError {
    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The lifecycle code behind this error, looking through context layers
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Code(code) => Some(*code),
            Self::WithContext { source, .. } => source.code(),
            _ => None,
        }
    }

    /// A short suggestion for the user, if there is a useful one
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::Code(ErrorCode::NeedInit) => Some("Call init() with a capture region before start()"),
            Self::Code(ErrorCode::OpenInputFailed) => Some(
                "Check that the capture device exists (see `deskrec devices`) and that the region lies on screen",
            ),
            Self::Code(ErrorCode::FindStreamFailed) => {
                Some("The capture device produced no video stream; try a different device")
            }
            Self::Code(ErrorCode::FindDecoderFailed | ErrorCode::OpenCodecFailed) => {
                Some("FFmpeg lacks a usable decoder for this device's output format")
            }
            Self::Code(ErrorCode::ReadFrameFailed | ErrorCode::DecodeFrameFailed) => {
                Some("The capture device stopped delivering frames; re-run init and start")
            }
            Self::InvalidRegion { .. } => Some("Use --region LEFT,TOP,RIGHT,BOTTOM with RIGHT > LEFT and BOTTOM > TOP"),
            Self::InvalidFrameRate => Some("Use --fps with a value of at least 1"),
            Self::Config(_) => Some("Check ~/.config/deskrec/config.toml, or run `deskrec config init`"),
            Self::WithContext { source, .. } => source.user_hint(),
            Self::Backend(_) | Self::Io(_) => None,
        }
    }

    /// Whether the user can fix this without touching code
    pub fn is_user_recoverable(&self) -> bool {
        match self {
            Self::Code(code) => !matches!(
                code,
                ErrorCode::FindDecoderFailed | ErrorCode::OpenCodecFailed
            ),
            Self::InvalidRegion { .. } | Self::InvalidFrameRate | Self::Config(_) => true,
            Self::WithContext { source, .. } => source.is_user_recoverable(),
            Self::Backend(_) | Self::Io(_) => false,
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<DeskrecError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Error> for DeskrecError {
    fn from(err: ffmpeg_next::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
