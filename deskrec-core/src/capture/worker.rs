//! The capture loop run on the recorder's background thread
//!
//! Reads samples, decodes the ones belonging to the video stream and hands
//! pictures to the data callback. The first read or decode failure is
//! reported once through the error callback and ends the run.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, info, trace};

use super::session::CaptureSession;
use crate::backend::{CaptureSource, Sample, SampleDecoder};
use crate::error::ErrorCode;
use crate::types::DecodedFrame;

/// Frame callback; runs on the capture thread
pub type DataCallback = Box<dyn FnMut(&DecodedFrame) + Send>;

/// Error callback; runs on the capture thread, at most once per run
pub type ErrorCallback = Box<dyn FnMut(ErrorCode) + Send>;

/// Registered callbacks, shared between the recorder and its capture thread
///
/// The registry lock is only held to swap or clone a callback handle. Each
/// callback sits behind its own lock and runs with the registry unlocked, so
/// registering a new callback never waits for a running one.
#[derive(Default)]
pub struct Callbacks {
    on_data: Option<Arc<Mutex<DataCallback>>>,
    on_error: Option<Arc<Mutex<ErrorCallback>>>,
}

impl Callbacks {
    pub(crate) fn set_on_data(&mut self, on_data: DataCallback) {
        self.on_data = Some(Arc::new(Mutex::new(on_data)));
    }

    pub(crate) fn set_on_error(&mut self, on_error: ErrorCallback) {
        self.on_error = Some(Arc::new(Mutex::new(on_error)));
    }
}

fn emit_data(callbacks: &Mutex<Callbacks>, frame: &DecodedFrame) {
    let on_data = callbacks.lock().on_data.clone();
    if let Some(on_data) = on_data {
        let mut on_data = on_data.lock();
        (&mut **on_data)(frame);
    }
}

fn emit_error(callbacks: &Mutex<Callbacks>, code: ErrorCode) {
    let on_error = callbacks.lock().on_error.clone();
    if let Some(on_error) = on_error {
        let mut on_error = on_error.lock();
        (&mut **on_error)(code);
    }
}

/// State shared between the recorder and its capture thread
#[derive(Debug, Default)]
pub struct LoopShared {
    /// Cleared by `stop`, or by the loop itself when it fails
    pub(crate) running: AtomicBool,
    /// Pictures handed to the data callback
    pub(crate) frames_delivered: AtomicU64,
    /// Samples read from the source
    pub(crate) samples_read: AtomicU64,
    /// Samples belonging to other streams
    pub(crate) samples_skipped: AtomicU64,
}

impl LoopShared {
    pub(crate) fn reset_counters(&self) {
        self.frames_delivered.store(0, Ordering::Relaxed);
        self.samples_read.store(0, Ordering::Relaxed);
        self.samples_skipped.store(0, Ordering::Relaxed);
    }
}

/// How a capture loop run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The running flag was cleared
    Stopped,
    /// A runtime error was reported through the error callback
    Failed(ErrorCode),
    /// A callback panicked
    Panicked,
}

/// Run the capture loop until the running flag clears or an error occurs
pub fn run_capture_loop<S: CaptureSource>(
    session: &mut CaptureSession<S>,
    shared: &LoopShared,
    callbacks: &Mutex<Callbacks>,
) -> LoopExit {
    let exit = match session.parts_mut() {
        Some((source, decoder, stream_index)) => {
            info!("Capture loop started on stream {}", stream_index);
            pump(source, decoder, stream_index, shared, callbacks)
        }
        None => {
            error!("Capture loop started without an open session");
            emit_error(callbacks, ErrorCode::ReadFrameFailed);
            LoopExit::Failed(ErrorCode::ReadFrameFailed)
        }
    };

    if exit != LoopExit::Stopped {
        shared.running.store(false, Ordering::SeqCst);
    }

    info!(
        "Capture loop ended ({:?}) after {} frames",
        exit,
        shared.frames_delivered.load(Ordering::Relaxed)
    );
    exit
}

fn pump<S: CaptureSource>(
    source: &mut S,
    decoder: &mut S::Decoder,
    stream_index: usize,
    shared: &LoopShared,
    callbacks: &Mutex<Callbacks>,
) -> LoopExit {
    let mut frame = DecodedFrame::default();

    while shared.running.load(Ordering::SeqCst) {
        let sample = match source.read_sample() {
            Ok(sample) => sample,
            Err(e) => {
                error!("Read frame failed: {}", e);
                emit_error(callbacks, ErrorCode::ReadFrameFailed);
                return LoopExit::Failed(ErrorCode::ReadFrameFailed);
            }
        };
        let read = shared.samples_read.fetch_add(1, Ordering::Relaxed);

        if sample.stream_index() != stream_index {
            trace!("Skipping sample from stream {}", sample.stream_index());
            shared.samples_skipped.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        let mut deliver = |picture: &DecodedFrame| {
            emit_data(callbacks, picture);
            let delivered = shared.frames_delivered.fetch_add(1, Ordering::Relaxed);
            if delivered % 60 == 0 {
                trace!("Delivered {} frames ({} samples read)", delivered + 1, read + 1);
            }
        };

        match decoder.decode(&sample, &mut frame, &mut deliver) {
            Ok(0) => debug!("Decoder needs more input"),
            Ok(_) => {}
            Err(e) => {
                error!("Decode desktop frame failed: {}", e);
                emit_error(callbacks, ErrorCode::DecodeFrameFailed);
                return LoopExit::Failed(ErrorCode::DecodeFrameFailed);
            }
        }
        // `sample` is released here, before the next read
    }

    LoopExit::Stopped
}
