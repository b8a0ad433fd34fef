// Configuration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Configuration error code constants exposed across the FFI boundary
///
/// These constants provide a single source of truth for error codes
/// shared between Rust and the host application (Kotlin on Android).
///
/// Error code range: 1001-1003
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// Tempo value is invalid (must be > 0)
    pub const INVALID_TEMPO: i32 = 1001;

    /// Pattern contains no beats
    pub const EMPTY_PATTERN: i32 = 1002;

    /// Beat state ordinal received over FFI does not map to a known state
    pub const UNKNOWN_BEAT_STATE: i32 = 1003;
}

/// Log a configuration error with structured context
pub fn log_config_error(err: &ConfigError, context: &str) {
    error!(
        "Config error in {}: code={}, component=MetronomeEngine, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Configuration errors
///
/// These errors cover tempo and pattern validation at the control API
/// boundary. Invalid values are rejected here and never reach the render
/// thread.
///
/// Error code range: 1001-1003
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Tempo value is invalid (must be > 0)
    InvalidTempo { bpm: u32 },

    /// Pattern contains no beats
    EmptyPattern,

    /// Beat state ordinal does not map to a known state
    UnknownBeatState { value: i32 },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidTempo { .. } => ConfigErrorCodes::INVALID_TEMPO,
            ConfigError::EmptyPattern => ConfigErrorCodes::EMPTY_PATTERN,
            ConfigError::UnknownBeatState { .. } => ConfigErrorCodes::UNKNOWN_BEAT_STATE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidTempo { bpm } => {
                format!("Tempo must be greater than 0 BPM (got {})", bpm)
            }
            ConfigError::EmptyPattern => {
                "Pattern must contain at least one beat".to_string()
            }
            ConfigError::UnknownBeatState { value } => {
                format!("Unknown beat state ordinal {} (expected 0-3)", value)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConfigError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ConfigError {}
