//! Engine configuration
//!
//! This module provides the output stream geometry (sample rate, burst size,
//! channel count) with JSON file loading for desktop runs. On Android the
//! geometry comes from the platform's `AudioSettingsProvider` instead of a
//! file, since the optimal values are per-device.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::InitError;
use crate::providers::AudioSettingsProvider;

/// Output stream geometry for the metronome engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Preferred frames per render callback
    pub frames_per_burst: u32,
    /// Number of output channels (clicks are mono, duplicated per channel)
    pub channel_count: u16,
}

impl Default for EngineConfig {
    /// Default geometry (fallback if no config file and no provider).
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            frames_per_burst: 192,
            channel_count: 2,
        }
    }
}

impl EngineConfig {
    /// Build a config from the platform's preferred output geometry.
    ///
    /// Queried once before engine construction; the channel count stays at
    /// the default since the platform providers only report rate and burst.
    pub fn from_provider(provider: &dyn AudioSettingsProvider) -> Self {
        Self {
            sample_rate: provider.sample_rate(),
            frames_per_burst: provider.frames_per_burst(),
            ..Self::default()
        }
    }

    /// Check that every field is usable before the engine touches it.
    ///
    /// # Errors
    /// Returns `InitError::InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<(), InitError> {
        if self.sample_rate == 0 {
            return Err(InitError::InvalidConfig {
                reason: "sample_rate must be > 0".to_string(),
            });
        }
        if self.frames_per_burst == 0 {
            return Err(InitError::InvalidConfig {
                reason: "frames_per_burst must be > 0".to_string(),
            });
        }
        if self.channel_count == 0 {
            return Err(InitError::InvalidConfig {
                reason: "channel_count must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the default config (with a logged
    /// warning) if the file is missing or invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration for non-Android platforms
    #[cfg(not(target_os = "android"))]
    pub fn load() -> Self {
        Self::load_from_file("assets/metronome_config.json")
    }
}
