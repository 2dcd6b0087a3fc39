//! Capture session and the background capture loop
//!
//! This module handles:
//! - Opening the backend source and binding a decoder to its video stream
//! - The read/decode/dispatch loop run on the recorder's thread

pub mod session;
pub mod worker;

pub use session::{CaptureSession, SessionInfo};
pub use worker::{Callbacks, DataCallback, ErrorCallback, LoopExit};
