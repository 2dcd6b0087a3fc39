//! Recorder lifecycle
//!
//! [`Recorder`] is the public state machine around a capture session:
//!
//! ```text
//!                init              start
//! Uninitialized ─────▶ Initialized ─────▶ Running
//!       ▲                  ▲   ◀────────────┘
//!       │                  │   stop / runtime error
//!       └──── teardown ────┘
//! ```
//!
//! While running, the session is moved onto a dedicated capture thread and
//! handed back when that thread is joined. Callbacks run on the capture
//! thread.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::backend::CaptureBackend;
use crate::capture::worker::{self, Callbacks, LoopExit, LoopShared};
use crate::capture::{CaptureSession, SessionInfo};
use crate::error::ErrorCode;
use crate::types::{CaptureRegion, DecodedFrame, FrameRate, PixelFormat, RecorderState, TimeBase};

/// Name of the capture thread
pub const CAPTURE_THREAD_NAME: &str = "deskrec-capture";

type Session<B> = CaptureSession<<B as CaptureBackend>::Source>;

/// Desktop region recorder
///
/// Owns the capture session and the thread running the capture loop. Every
/// exit path, including drop while running, joins the thread and closes the
/// session.
pub struct Recorder<B: CaptureBackend> {
    /// Opens capture sources
    backend: B,
    /// The session; `None` while it is lent to the capture thread
    session: Option<Session<B>>,
    /// Capture thread, returning the session when joined
    thread: Option<JoinHandle<(Session<B>, LoopExit)>>,
    /// Flags and counters shared with the capture thread
    shared: Arc<LoopShared>,
    /// Registered callbacks
    callbacks: Arc<Mutex<Callbacks>>,
    /// Metadata of the open session, kept while the session is on the thread
    info: Option<SessionInfo>,
    /// How the last run ended
    last_exit: Option<LoopExit>,
}

impl<B: CaptureBackend> Recorder<B> {
    /// Create an uninitialized recorder using `backend`
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            session: Some(CaptureSession::new()),
            thread: None,
            shared: Arc::new(LoopShared::default()),
            callbacks: Arc::new(Mutex::new(Callbacks::default())),
            info: None,
            last_exit: None,
        }
    }

    /// The backend this recorder opens sources with
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Open the capture session for `region` at `fps`
    ///
    /// Does nothing if already initialized. On failure the recorder stays
    /// uninitialized and can be initialized again.
    pub fn init(&mut self, region: CaptureRegion, fps: FrameRate) -> Result<(), ErrorCode> {
        if self.info.is_some() {
            return Ok(());
        }

        let session = self.session.get_or_insert_with(CaptureSession::new);
        session.open(&mut self.backend, &region, fps)?;

        self.info = session.info().cloned();
        info!("Recorder initialized: region {} @ {}", region, fps);
        Ok(())
    }

    /// Start capturing on a background thread
    ///
    /// Starting a running recorder only logs a warning. A stopped recorder
    /// restarts on the same session, continuing from wherever the source is.
    pub fn start(&mut self) -> Result<(), ErrorCode> {
        if self.is_running() {
            warn!("Recorder is already running");
            return Ok(());
        }

        if self.info.is_none() {
            return Err(ErrorCode::NeedInit);
        }

        // A previous run may have ended on its own
        self.join_capture_thread();

        let Some(mut session) = self.session.take() else {
            error!("Capture session missing; initialize again");
            self.info = None;
            return Err(ErrorCode::NeedInit);
        };

        self.shared.reset_counters();
        self.shared.running.store(true, Ordering::SeqCst);
        self.last_exit = None;

        let shared = self.shared.clone();
        let callbacks = self.callbacks.clone();

        let spawned = std::thread::Builder::new()
            .name(CAPTURE_THREAD_NAME.to_string())
            .spawn(move || {
                let run = std::panic::AssertUnwindSafe(|| {
                    worker::run_capture_loop(&mut session, &shared, &callbacks)
                });
                let exit = std::panic::catch_unwind(run).unwrap_or_else(|_| {
                    error!("Capture callback panicked; capture loop aborted");
                    shared.running.store(false, Ordering::SeqCst);
                    LoopExit::Panicked
                });
                (session, exit)
            });

        match spawned {
            Ok(handle) => {
                self.thread = Some(handle);
                info!("Recorder started");
                Ok(())
            }
            Err(e) => {
                // The session went down with the closure
                error!("Failed to spawn capture thread: {}", e);
                self.shared.running.store(false, Ordering::SeqCst);
                self.info = None;
                self.session = Some(CaptureSession::new());
                Err(ErrorCode::NeedInit)
            }
        }
    }

    /// Stop capturing and wait for the capture thread to exit
    ///
    /// Always succeeds, and does nothing if not running. The current read or
    /// decode finishes before the thread notices; a backend that blocks in
    /// a read forever keeps this call waiting. Must not be called from a
    /// data or error callback.
    pub fn stop(&mut self) -> Result<(), ErrorCode> {
        let was_running = self.shared.running.swap(false, Ordering::SeqCst);
        self.join_capture_thread();
        if was_running {
            info!("Recorder stopped");
        }
        Ok(())
    }

    /// Reserved; capture keeps running
    pub fn pause(&mut self) -> Result<(), ErrorCode> {
        debug!("pause() is not implemented");
        Ok(())
    }

    /// Reserved; capture state is unchanged
    pub fn resume(&mut self) -> Result<(), ErrorCode> {
        debug!("resume() is not implemented");
        Ok(())
    }

    /// Stop, then close the session, returning to `Uninitialized`
    pub fn teardown(&mut self) {
        let _ = self.stop();
        if let Some(session) = self.session.as_mut() {
            session.close();
        }
        if self.info.take().is_some() {
            info!("Recorder torn down");
        }
    }

    fn join_capture_thread(&mut self) {
        let Some(handle) = self.thread.take() else {
            return;
        };

        if handle.thread().id() == std::thread::current().id() {
            error!("stop() called from a capture callback; cannot join the capture thread from itself");
            self.thread = Some(handle);
            return;
        }

        match handle.join() {
            Ok((session, exit)) => {
                debug!("Capture thread joined ({:?})", exit);
                self.session = Some(session);
                self.last_exit = Some(exit);
            }
            Err(_) => {
                error!("Capture thread panicked; session lost");
                self.session = Some(CaptureSession::new());
                self.info = None;
                self.last_exit = Some(LoopExit::Panicked);
            }
        }
    }

    /// Register the frame callback, replacing any previous one
    ///
    /// Runs on the capture thread. The frame is only valid for the call.
    /// Does not wait for a callback that is currently running; the new one
    /// takes over from the next frame.
    pub fn set_on_data<F>(&self, on_data: F)
    where
        F: FnMut(&DecodedFrame) + Send + 'static,
    {
        self.callbacks.lock().set_on_data(Box::new(on_data));
    }

    /// Register the error callback, replacing any previous one
    ///
    /// Runs on the capture thread, at most once per run.
    pub fn set_on_error<F>(&self, on_error: F)
    where
        F: FnMut(ErrorCode) + Send + 'static,
    {
        self.callbacks.lock().set_on_error(Box::new(on_error));
    }

    /// Remove both callbacks
    pub fn clear_callbacks(&self) {
        *self.callbacks.lock() = Callbacks::default();
    }

    /// Current lifecycle state
    pub fn state(&self) -> RecorderState {
        if self.info.is_none() {
            RecorderState::Uninitialized
        } else if self.is_running() {
            RecorderState::Running
        } else {
            RecorderState::Initialized
        }
    }

    /// Whether the capture loop is running
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Whether a capture thread exists that has not been joined yet
    pub fn has_capture_thread(&self) -> bool {
        self.thread.is_some()
    }

    /// Time base of the video stream, `1/90000` when not initialized
    pub fn time_base(&self) -> TimeBase {
        self.info
            .as_ref()
            .map(|i| i.stream.time_base)
            .unwrap_or(TimeBase::DEFAULT)
    }

    /// Start time of the video stream, `None` when not initialized or unknown
    pub fn start_time(&self) -> Option<i64> {
        self.info.as_ref().and_then(|i| i.stream.start_time)
    }

    /// Pixel format of delivered frames, `None` when not initialized
    pub fn pixel_format(&self) -> Option<PixelFormat> {
        self.info.as_ref().map(|i| i.pixel_format.clone())
    }

    /// Metadata of the open session
    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.info.as_ref()
    }

    /// How the most recent run ended, once its thread has been joined
    pub fn last_exit(&self) -> Option<LoopExit> {
        self.last_exit
    }

    /// Counters for the current or most recent run
    pub fn stats(&self) -> RecorderStats {
        RecorderStats {
            state: self.state(),
            frames_delivered: self.shared.frames_delivered.load(Ordering::Relaxed),
            samples_read: self.shared.samples_read.load(Ordering::Relaxed),
            samples_skipped: self.shared.samples_skipped.load(Ordering::Relaxed),
        }
    }
}

impl<B: CaptureBackend> Drop for Recorder<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Recorder statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderStats {
    /// Lifecycle state
    pub state: RecorderState,
    /// Frames delivered to the data callback
    pub frames_delivered: u64,
    /// Samples read from the source
    pub samples_read: u64,
    /// Samples from streams other than the video stream
    pub samples_skipped: u64,
}

impl std::fmt::Display for RecorderStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} | {} frames delivered | {} samples read ({} skipped)",
            self.state, self.frames_delivered, self.samples_read, self.samples_skipped
        )
    }
}
