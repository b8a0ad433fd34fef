//! Core domain types shared between the control API, the render engine,
//! and the FFI surface.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default tempo of the initial measure, in beats per minute.
pub const DEFAULT_BPM: u32 = 120;

/// Per-beat emphasis within a measure.
///
/// The discriminants are the FFI ordinals used by the host application when
/// marshaling patterns as `int[]`; they must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum BeatState {
    /// Regular click
    Normal = 0,
    /// No sound; the beat still advances and emits an event
    Silence = 1,
    /// Strong click marking the start of a measure
    Accent = 2,
    /// Click between normal and accent strength
    Medium = 3,
}

impl BeatState {
    /// Number of distinct beat states (sample bank slot count).
    pub const COUNT: usize = 4;

    /// All states in ordinal order.
    pub const ALL: [BeatState; BeatState::COUNT] = [
        BeatState::Normal,
        BeatState::Silence,
        BeatState::Accent,
        BeatState::Medium,
    ];

    /// Decode an FFI ordinal into a beat state.
    ///
    /// # Errors
    /// Returns `ConfigError::UnknownBeatState` for ordinals outside 0-3.
    pub fn from_ordinal(value: i32) -> Result<BeatState, ConfigError> {
        match value {
            0 => Ok(BeatState::Normal),
            1 => Ok(BeatState::Silence),
            2 => Ok(BeatState::Accent),
            3 => Ok(BeatState::Medium),
            _ => Err(ConfigError::UnknownBeatState { value }),
        }
    }

    /// The FFI ordinal for this state.
    #[inline]
    pub fn ordinal(self) -> i32 {
        self as i32
    }

    /// Sample bank slot index for this state.
    #[inline]
    pub fn slot(self) -> usize {
        self as usize
    }
}

/// A validated measure: an ordered, non-empty list of beat states.
///
/// Emptiness is rejected at construction so the render thread can rely on
/// `len() >= 1` without checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Pattern {
    steps: Vec<BeatState>,
}

impl Pattern {
    /// Build a pattern from beat states.
    ///
    /// # Errors
    /// Returns `ConfigError::EmptyPattern` if `steps` is empty.
    pub fn new(steps: Vec<BeatState>) -> Result<Pattern, ConfigError> {
        if steps.is_empty() {
            return Err(ConfigError::EmptyPattern);
        }
        Ok(Pattern { steps })
    }

    /// Build a pattern from FFI ordinals.
    ///
    /// # Errors
    /// Returns `ConfigError::EmptyPattern` for an empty slice and
    /// `ConfigError::UnknownBeatState` for any unmapped ordinal.
    pub fn from_ordinals(ordinals: &[i32]) -> Result<Pattern, ConfigError> {
        let steps = ordinals
            .iter()
            .map(|&value| BeatState::from_ordinal(value))
            .collect::<Result<Vec<_>, _>>()?;
        Pattern::new(steps)
    }

    /// Number of beats in the measure (always >= 1).
    #[inline]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false; patterns cannot be empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The beat state at `index`. `index` must be < `len()`.
    #[inline]
    pub fn step(&self, index: usize) -> BeatState {
        self.steps[index]
    }

    /// All steps in order.
    pub fn steps(&self) -> &[BeatState] {
        &self.steps
    }
}

impl Default for Pattern {
    /// The initial measure shipped by the app: one accent followed by three
    /// normal beats.
    fn default() -> Self {
        Pattern {
            steps: vec![
                BeatState::Accent,
                BeatState::Normal,
                BeatState::Normal,
                BeatState::Normal,
            ],
        }
    }
}

/// Beat onset notification pushed from the render thread.
///
/// `generation` identifies the configuration snapshot that produced the
/// event. Consumers that just changed tempo or pattern compare it against
/// the store's current generation to drop events already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeatEvent {
    /// Index into the pattern (0-based)
    pub beat_index: u32,
    /// Generation of the snapshot active when the beat fired
    pub generation: u64,
}

/// Control-plane lifecycle notification.
///
/// Emitted on the engine's event channel whenever playback or configuration
/// changes, and when the platform stream fails asynchronously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Milliseconds since the engine was initialized
    pub timestamp_ms: u64,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    /// Build an event stamped against the engine's creation instant.
    pub fn at(epoch: Instant, kind: EngineEventKind) -> EngineEvent {
        EngineEvent {
            timestamp_ms: epoch.elapsed().as_millis() as u64,
            kind,
        }
    }
}

/// Kinds of lifecycle events surfaced to UI layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineEventKind {
    Started,
    Stopped,
    TempoChanged { bpm: u32 },
    PatternChanged { len: usize },
    StreamFailed,
    ShutDown,
}

/// Whether the engine is audibly running.
///
/// The render thread observes this as a lock-free atomic flag owned by the
/// stream manager; this enum is the control-plane view of that flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Stopped,
    Playing,
}

impl PlaybackState {
    pub fn from_flag(playing: bool) -> PlaybackState {
        if playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Stopped
        }
    }
}
