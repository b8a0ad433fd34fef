// Stream lifecycle error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Stream error code constants exposed across the FFI boundary
///
/// These constants provide a single source of truth for error codes
/// shared between Rust and the host application (Kotlin on Android).
///
/// Error code range: 2001-2011
pub struct StreamErrorCodes {}

impl StreamErrorCodes {
    /// Operation requires an opened stream
    pub const NOT_OPENED: i32 = 2001;

    /// Operation requires a started stream
    pub const NOT_STARTED: i32 = 2002;

    /// Stream is already opened
    pub const ALREADY_OPENED: i32 = 2003;

    /// Stream is already started
    pub const ALREADY_STARTED: i32 = 2004;

    /// No output device is available
    pub const NO_OUTPUT_DEVICE: i32 = 2005;

    /// Failed to open the output stream
    pub const OPEN_FAILED: i32 = 2006;

    /// Failed to start the output stream
    pub const START_FAILED: i32 = 2007;

    /// Failed to stop the output stream
    pub const STOP_FAILED: i32 = 2008;

    /// Output device disconnected or stream died
    pub const DISCONNECTED: i32 = 2009;

    /// Mutex was poisoned
    pub const LOCK_POISONED: i32 = 2010;

    /// Stream owner thread exited unexpectedly
    pub const WORKER_GONE: i32 = 2011;
}

/// Log a stream error with structured context
pub fn log_stream_error(err: &StreamError, context: &str) {
    error!(
        "Stream error in {}: code={}, component=StreamManager, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Stream lifecycle errors
///
/// These errors cover opening, starting, stopping, and closing the
/// platform output stream, plus asynchronous device failures.
///
/// Error code range: 2001-2011
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Operation requires an opened stream
    NotOpened,

    /// Operation requires a started stream
    NotStarted,

    /// Stream is already opened
    AlreadyOpened,

    /// Stream is already started
    AlreadyStarted,

    /// No output device is available
    NoOutputDevice,

    /// Failed to open the output stream
    OpenFailed { reason: String },

    /// Failed to start the output stream
    StartFailed { reason: String },

    /// Failed to stop the output stream
    StopFailed { reason: String },

    /// Output device disconnected or stream died
    Disconnected,

    /// Mutex was poisoned
    LockPoisoned { component: String },

    /// Stream owner thread exited unexpectedly
    WorkerGone,
}

impl StreamError {
    /// Shorthand for mapping a poisoned lock on a named component.
    pub fn poisoned(component: &str) -> Self {
        StreamError::LockPoisoned {
            component: component.to_string(),
        }
    }
}

impl ErrorCode for StreamError {
    fn code(&self) -> i32 {
        match self {
            StreamError::NotOpened => StreamErrorCodes::NOT_OPENED,
            StreamError::NotStarted => StreamErrorCodes::NOT_STARTED,
            StreamError::AlreadyOpened => StreamErrorCodes::ALREADY_OPENED,
            StreamError::AlreadyStarted => StreamErrorCodes::ALREADY_STARTED,
            StreamError::NoOutputDevice => StreamErrorCodes::NO_OUTPUT_DEVICE,
            StreamError::OpenFailed { .. } => StreamErrorCodes::OPEN_FAILED,
            StreamError::StartFailed { .. } => StreamErrorCodes::START_FAILED,
            StreamError::StopFailed { .. } => StreamErrorCodes::STOP_FAILED,
            StreamError::Disconnected => StreamErrorCodes::DISCONNECTED,
            StreamError::LockPoisoned { .. } => StreamErrorCodes::LOCK_POISONED,
            StreamError::WorkerGone => StreamErrorCodes::WORKER_GONE,
        }
    }

    fn message(&self) -> String {
        match self {
            StreamError::NotOpened => {
                "Stream not opened. Call initialize() first.".to_string()
            }
            StreamError::NotStarted => {
                "Stream not started. Call play() first.".to_string()
            }
            StreamError::AlreadyOpened => {
                "Stream already opened.".to_string()
            }
            StreamError::AlreadyStarted => {
                "Stream already started. Call pause() first.".to_string()
            }
            StreamError::NoOutputDevice => {
                "No audio output device available".to_string()
            }
            StreamError::OpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            StreamError::StartFailed { reason } => {
                format!("Failed to start audio stream: {}", reason)
            }
            StreamError::StopFailed { reason } => {
                format!("Failed to stop audio stream: {}", reason)
            }
            StreamError::Disconnected => {
                "Audio output device disconnected".to_string()
            }
            StreamError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            StreamError::WorkerGone => {
                "Stream owner thread exited unexpectedly".to_string()
            }
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StreamError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StreamError {}
