//! External collaborator seams
//!
//! The engine receives its stream geometry and click sample data through
//! these traits so that the Android host, the desktop CLI, and tests can
//! each supply their own sources without touching engine code.

use std::path::{Path, PathBuf};

use crate::error::InitError;
use crate::model::BeatState;

/// Platform-preferred output stream geometry.
///
/// On Android this is backed by `AudioManager`'s native sample rate and
/// frames-per-buffer properties; queried once before engine construction.
pub trait AudioSettingsProvider: Send + Sync {
    /// Native output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Native burst size in frames
    fn frames_per_burst(&self) -> u32;
}

/// Fixed geometry for tests and desktop runs.
pub struct FixedAudioSettings {
    sample_rate: u32,
    frames_per_burst: u32,
}

impl FixedAudioSettings {
    pub fn new(sample_rate: u32, frames_per_burst: u32) -> Self {
        Self {
            sample_rate,
            frames_per_burst,
        }
    }
}

impl Default for FixedAudioSettings {
    /// The device class this engine ships on reports 48 kHz with 192-frame
    /// bursts; tests use the same numbers.
    fn default() -> Self {
        Self::new(48_000, 192)
    }
}

impl AudioSettingsProvider for FixedAudioSettings {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn frames_per_burst(&self) -> u32 {
        self.frames_per_burst
    }
}

/// Decoded click audio as delivered by a provider.
///
/// Interleaved if `channels > 1`; the sample bank mixes down to mono.
#[derive(Debug, Clone)]
pub struct DecodedClick {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Source of per-beat-state click audio.
///
/// `load` returns `None` when no asset exists for a state (Silence never has
/// one) and `Some(Err(..))` when an asset exists but cannot be used. The
/// sample bank degrades unusable slots to silence with a logged warning, so
/// a provider error never aborts engine construction.
pub trait ClickSampleProvider: Send + Sync {
    fn load(&self, state: BeatState) -> Option<Result<DecodedClick, InitError>>;
}

/// Default click asset filename for the normal beat.
pub const NORMAL_BEAT_FILE: &str = "a_m_wood_light_tip.wav";
/// Default click asset filename for the accented beat.
pub const ACCENT_BEAT_FILE: &str = "a_m_wet_wood_vinyl_hit_to.wav";
/// Default click asset filename for the medium beat.
pub const MEDIUM_BEAT_FILE: &str = "a_m_wood_hit_pi.wav";

/// WAV-file click provider reading the stock asset names from a directory.
pub struct WavClickProvider {
    dir: PathBuf,
}

impl WavClickProvider {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(state: BeatState) -> Option<&'static str> {
        match state {
            BeatState::Normal => Some(NORMAL_BEAT_FILE),
            BeatState::Accent => Some(ACCENT_BEAT_FILE),
            BeatState::Medium => Some(MEDIUM_BEAT_FILE),
            BeatState::Silence => None,
        }
    }
}

impl ClickSampleProvider for WavClickProvider {
    fn load(&self, state: BeatState) -> Option<Result<DecodedClick, InitError>> {
        let file = Self::file_for(state)?;
        let path = self.dir.join(file);
        if !path.exists() {
            return None;
        }
        Some(read_wav(&path))
    }
}

/// Decode a WAV file to f32 samples, normalizing integer formats.
///
/// # Errors
/// Returns `InitError::AssetUnreadable` if the file cannot be opened or its
/// sample format is unsupported.
pub fn read_wav(path: &Path) -> Result<DecodedClick, InitError> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let unreadable = |reason: String| InitError::AssetUnreadable {
        name: name.clone(),
        reason,
    };

    let mut reader = hound::WavReader::open(path).map_err(|err| unreadable(err.to_string()))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(|err| unreadable(err.to_string())))
            .collect::<Result<Vec<f32>, InitError>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) - 1;
            match spec.bits_per_sample {
                16 => reader
                    .samples::<i16>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max as f32)
                            .map_err(|err| unreadable(err.to_string()))
                    })
                    .collect::<Result<Vec<f32>, InitError>>()?,
                24 | 32 => reader
                    .samples::<i32>()
                    .map(|sample| {
                        sample
                            .map(|value| value as f32 / max as f32)
                            .map_err(|err| unreadable(err.to_string()))
                    })
                    .collect::<Result<Vec<f32>, InitError>>()?,
                other => {
                    return Err(unreadable(format!("unsupported bits per sample {}", other)))
                }
            }
        }
    };

    Ok(DecodedClick {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}
