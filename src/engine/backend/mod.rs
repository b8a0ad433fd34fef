//! Backend abstractions for the engine core.

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::audio::pattern_store::PatternStore;
use crate::audio::sample_bank::SampleBank;
use crate::config::EngineConfig;
use crate::error::StreamError;
use crate::model::{BeatEvent, EngineEvent};

/// Context provided to audio backends when opening the output stream.
///
/// This bundles the shared state and channels the backend wires into its
/// render pipeline without coupling it to higher-level code. The `playing`
/// and `errored` flags are owned by the stream manager; the backend's
/// render path reads `playing` and its error path latches `errored`.
pub struct StreamContext {
    pub config: EngineConfig,
    pub store: Arc<PatternStore>,
    pub bank: Arc<SampleBank>,
    pub playing: Arc<AtomicBool>,
    /// Bumped by the manager on every play; a change tells the renderer to
    /// restart its transport at beat 0.
    pub session: Arc<AtomicU64>,
    pub errored: Arc<AtomicBool>,
    pub beats_tx: broadcast::Sender<BeatEvent>,
    pub events_tx: broadcast::Sender<EngineEvent>,
    /// Engine creation instant; event timestamps count up from here.
    pub epoch: Instant,
}

/// Trait implemented by platform-specific audio backends.
///
/// Backends manage one output stream at a time. `open` builds the stream in
/// a stopped state, `start`/`stop` control callbacks, and `close` releases
/// the stream. State-machine validation lives in the stream manager; each
/// backend only defends the invariants it cannot survive violating
/// (double open, commands without a stream).
pub trait AudioBackend: Send + Sync {
    fn open(&self, ctx: StreamContext) -> Result<(), StreamError>;
    fn start(&self) -> Result<(), StreamError>;
    fn stop(&self) -> Result<(), StreamError>;
    fn close(&self) -> Result<(), StreamError>;
}

#[cfg(target_os = "android")]
mod oboe;
#[cfg(target_os = "android")]
pub use self::oboe::OboeBackend;

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use self::cpal::CpalBackend;

mod offline;
pub use offline::OfflineBackend;
