// Initialization error types and constants

use crate::error::{ErrorCode, StreamError};
use log::error;
use std::fmt;

/// Initialization error code constants exposed across the FFI boundary
///
/// These constants provide a single source of truth for error codes
/// shared between Rust and the host application (Kotlin on Android).
///
/// Error code range: 3001-3005
pub struct InitErrorCodes {}

impl InitErrorCodes {
    /// Engine configuration is invalid
    pub const INVALID_CONFIG: i32 = 3001;

    /// Click sample asset could not be read or decoded
    pub const ASSET_UNREADABLE: i32 = 3002;

    /// Click sample rate does not match the engine rate
    pub const SAMPLE_RATE_MISMATCH: i32 = 3003;

    /// Interleaved sample data does not match its channel count
    pub const CHANNEL_MISMATCH: i32 = 3004;

    /// Stream setup failed during initialization
    pub const STREAM_SETUP_FAILED: i32 = 3005;
}

/// Log an initialization error with structured context
pub fn log_init_error(err: &InitError, context: &str) {
    error!(
        "Init error in {}: code={}, component=MetronomeEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Initialization errors
///
/// These errors cover engine construction: configuration validation, click
/// sample decoding, and the initial stream open. A missing click sample is
/// not an error (that slot renders silence); a sample that exists but cannot
/// be used is.
///
/// Error code range: 3001-3005
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// Engine configuration is invalid
    InvalidConfig { reason: String },

    /// Click sample asset could not be read or decoded
    AssetUnreadable { name: String, reason: String },

    /// Click sample rate does not match the engine rate
    SampleRateMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// Interleaved sample data does not match its channel count
    ChannelMismatch { name: String, channels: u16 },

    /// Stream setup failed during initialization
    Stream(StreamError),
}

impl ErrorCode for InitError {
    fn code(&self) -> i32 {
        match self {
            InitError::InvalidConfig { .. } => InitErrorCodes::INVALID_CONFIG,
            InitError::AssetUnreadable { .. } => InitErrorCodes::ASSET_UNREADABLE,
            InitError::SampleRateMismatch { .. } => InitErrorCodes::SAMPLE_RATE_MISMATCH,
            InitError::ChannelMismatch { .. } => InitErrorCodes::CHANNEL_MISMATCH,
            InitError::Stream(_) => InitErrorCodes::STREAM_SETUP_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            InitError::InvalidConfig { reason } => {
                format!("Invalid engine configuration: {}", reason)
            }
            InitError::AssetUnreadable { name, reason } => {
                format!("Cannot read click sample {}: {}", name, reason)
            }
            InitError::SampleRateMismatch {
                name,
                expected,
                actual,
            } => {
                format!(
                    "Click sample {} is {} Hz but the engine runs at {} Hz",
                    name, actual, expected
                )
            }
            InitError::ChannelMismatch { name, channels } => {
                format!(
                    "Click sample {}: interleaved data does not match {} channels",
                    name, channels
                )
            }
            InitError::Stream(err) => {
                format!("Stream setup failed: {}", err.message())
            }
        }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InitError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for InitError {}

impl From<StreamError> for InitError {
    fn from(err: StreamError) -> Self {
        InitError::Stream(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_error_codes() {
        assert_eq!(
            InitError::InvalidConfig {
                reason: "test".to_string()
            }
            .code(),
            InitErrorCodes::INVALID_CONFIG
        );
        assert_eq!(
            InitError::AssetUnreadable {
                name: "click.wav".to_string(),
                reason: "test".to_string()
            }
            .code(),
            InitErrorCodes::ASSET_UNREADABLE
        );
        assert_eq!(
            InitError::SampleRateMismatch {
                name: "click.wav".to_string(),
                expected: 48000,
                actual: 44100
            }
            .code(),
            InitErrorCodes::SAMPLE_RATE_MISMATCH
        );
        assert_eq!(
            InitError::ChannelMismatch {
                name: "click.wav".to_string(),
                channels: 2
            }
            .code(),
            InitErrorCodes::CHANNEL_MISMATCH
        );
        assert_eq!(
            InitError::Stream(StreamError::NoOutputDevice).code(),
            InitErrorCodes::STREAM_SETUP_FAILED
        );
    }

    #[test]
    fn test_init_error_messages() {
        let err = InitError::SampleRateMismatch {
            name: "click.wav".to_string(),
            expected: 48000,
            actual: 44100,
        };
        assert_eq!(
            err.message(),
            "Click sample click.wav is 44100 Hz but the engine runs at 48000 Hz"
        );

        let err = InitError::InvalidConfig {
            reason: "sample_rate must be > 0".to_string(),
        };
        assert!(err.message().contains("sample_rate"));
    }

    #[test]
    fn test_from_stream_error() {
        let init_err: InitError = StreamError::NoOutputDevice.into();
        match init_err {
            InitError::Stream(StreamError::NoOutputDevice) => {}
            other => panic!("Expected Stream variant, got {:?}", other),
        }
    }

    #[test]
    fn test_init_error_display() {
        let err = InitError::Stream(StreamError::NoOutputDevice);
        let display = format!("{}", err);
        assert!(display.contains("InitError"));
        assert!(display.contains(&err.code().to_string()));
    }
}
