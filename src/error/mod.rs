// Error types for the metronome engine
//
// This module defines custom error types for configuration, stream lifecycle,
// and initialization, providing structured error handling with error codes
// suitable for FFI communication.

mod config;
mod init;
mod stream;

pub use config::{log_config_error, ConfigError, ConfigErrorCodes};
pub use init::{log_init_error, InitError, InitErrorCodes};
pub use stream::{log_stream_error, StreamError, StreamErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the FFI boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
