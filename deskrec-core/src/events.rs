//! Channel adapter for recorder callbacks
//!
//! Async consumers should not run inside the capture thread. This module
//! installs callbacks that copy each frame and forward it, along with any
//! error, over a `tokio::sync::broadcast` channel.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

use crate::backend::CaptureBackend;
use crate::error::ErrorCode;
use crate::recorder::Recorder;
use crate::types::DecodedFrame;

/// Something the capture thread produced
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A decoded picture, copied out of the capture loop
    Frame(Arc<DecodedFrame>),
    /// The run ended with a runtime error
    Error(ErrorCode),
}

impl CaptureEvent {
    /// Whether this event ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl<B: CaptureBackend> Recorder<B> {
    /// Replace the callbacks with a broadcast channel of capacity `capacity`
    ///
    /// Slow receivers lag and lose the oldest frames; sending never blocks
    /// the capture thread.
    pub fn event_channel(&self, capacity: usize) -> broadcast::Receiver<CaptureEvent> {
        let (tx, rx) = broadcast::channel(capacity.max(1));

        let frame_tx = tx.clone();
        self.set_on_data(move |frame| {
            if frame_tx.send(CaptureEvent::Frame(Arc::new(frame.clone()))).is_err() {
                trace!("No event receivers; frame dropped");
            }
        });
        self.set_on_error(move |code| {
            let _ = tx.send(CaptureEvent::Error(code));
        });

        rx
    }
}
