//! MetronomeEngine: the control-plane handle over the audio core.
//!
//! This struct is what the surrounding application (JNI surface, CLI, tests)
//! talks to: configuration publishes, play/pause, subscriptions, teardown.
//! Everything render-thread-facing lives below it in `audio` and
//! `managers::stream_manager`; this layer validates, orchestrates, and
//! broadcasts telemetry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use cfg_if::cfg_if;
use log::info;
use tokio::sync::broadcast;

use crate::audio::pattern_store::{PatternStore, Snapshot};
use crate::audio::sample_bank::SampleBank;
use crate::config::EngineConfig;
use crate::engine::backend::AudioBackend;
use crate::error::{log_config_error, log_init_error, log_stream_error};
use crate::error::{ConfigError, InitError, StreamError};
use crate::managers::{StreamManager, StreamResources, StreamState};
use crate::model::{BeatEvent, BeatState, EngineEvent, EngineEventKind, Pattern, PlaybackState};

#[path = "core_subscriptions.rs"]
mod core_subscriptions;

/// Capacity of the beat and telemetry broadcast channels. Lagging
/// subscribers lose the oldest entries, which is the relay's latest-value
/// contract anyway.
const BROADCAST_CAPACITY: usize = 128;

/// The metronome engine handle.
///
/// Constructed via [MetronomeEngine::initialize]; the stream is opened
/// immediately (warm, not running) so that `play()` is a cheap start.
/// Dropping the handle shuts it down.
pub struct MetronomeEngine {
    config: EngineConfig,
    store: Arc<PatternStore>,
    manager: StreamManager,
    beats_tx: broadcast::Sender<BeatEvent>,
    events_tx: broadcast::Sender<EngineEvent>,
    epoch: Instant,
    shut_down: AtomicBool,
}

impl MetronomeEngine {
    /// Build the engine on the platform's audio backend and open the stream.
    ///
    /// # Errors
    /// `InitError::InvalidConfig` for unusable geometry;
    /// `InitError::Stream` if the output stream cannot be opened.
    pub fn initialize(config: EngineConfig, bank: SampleBank) -> Result<Self, InitError> {
        Self::with_backend(config, bank, platform_backend())
    }

    /// Build the engine on a caller-supplied backend.
    ///
    /// Tests and the CLI's offline mode use this with
    /// [crate::engine::backend::OfflineBackend].
    pub fn with_backend(
        config: EngineConfig,
        bank: SampleBank,
        backend: Arc<dyn AudioBackend>,
    ) -> Result<Self, InitError> {
        config.validate().map_err(|err| {
            log_init_error(&err, "initialize");
            err
        })?;

        let store = Arc::new(PatternStore::new());
        let (beats_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let epoch = Instant::now();

        let manager = StreamManager::new(backend);
        manager
            .open(StreamResources {
                config,
                store: Arc::clone(&store),
                bank: Arc::new(bank),
                beats_tx: beats_tx.clone(),
                events_tx: events_tx.clone(),
                epoch,
            })
            .map_err(|err| {
                let err = InitError::Stream(err);
                log_init_error(&err, "initialize");
                err
            })?;

        info!(
            "[MetronomeEngine] Initialized: {} Hz, {} frames/burst, {} channels",
            config.sample_rate, config.frames_per_burst, config.channel_count
        );

        Ok(Self {
            config,
            store,
            manager,
            beats_tx,
            events_tx,
            epoch,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Publish a new tempo. Takes effect at the next beat boundary; the
    /// in-flight beat keeps its duration.
    ///
    /// # Errors
    /// `ConfigError::InvalidTempo` for `bpm == 0`; the previous snapshot
    /// stays active.
    pub fn set_tempo(&self, bpm: u32) -> Result<(), ConfigError> {
        self.store.set_tempo(bpm).map_err(|err| {
            log_config_error(&err, "set_tempo");
            err
        })?;
        info!("[MetronomeEngine] Tempo set to {} BPM", bpm);
        self.emit(EngineEventKind::TempoChanged { bpm });
        Ok(())
    }

    /// Publish a new pattern. Takes effect at the next beat boundary.
    ///
    /// # Errors
    /// `ConfigError::EmptyPattern` for an empty slice; the previous snapshot
    /// stays active.
    pub fn set_pattern(&self, steps: &[BeatState]) -> Result<(), ConfigError> {
        let pattern = Pattern::new(steps.to_vec()).map_err(|err| {
            log_config_error(&err, "set_pattern");
            err
        })?;
        let len = pattern.len();
        self.store.set_pattern(pattern);
        info!("[MetronomeEngine] Pattern set ({} beats)", len);
        self.emit(EngineEventKind::PatternChanged { len });
        Ok(())
    }

    /// Start playback from beat 0.
    ///
    /// From the `Errored` state this is the recovery path: the dead stream
    /// is rebuilt before starting.
    ///
    /// # Errors
    /// Stream lifecycle errors pass through; `AlreadyStarted` if playing.
    pub fn play(&self) -> Result<(), StreamError> {
        self.manager.start().map_err(|err| {
            log_stream_error(&err, "play");
            err
        })?;
        self.emit(EngineEventKind::Started);
        Ok(())
    }

    /// Stop playback. Silence is audible on the very next render callback.
    ///
    /// # Errors
    /// `NotStarted` if playback is not running.
    pub fn pause(&self) -> Result<(), StreamError> {
        self.manager.stop().map_err(|err| {
            log_stream_error(&err, "pause");
            err
        })?;
        self.emit(EngineEventKind::Stopped);
        Ok(())
    }

    /// Tear down the stream and release render resources. Idempotent; also
    /// invoked from `Drop`.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.manager.close();
        self.emit(EngineEventKind::ShutDown);
        info!("[MetronomeEngine] Shut down");
    }

    // ========================================================================
    // INTROSPECTION
    // ========================================================================

    /// The currently published configuration snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.store.load_full()
    }

    pub fn is_playing(&self) -> bool {
        self.manager.is_playing()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.manager.playback_state()
    }

    pub fn stream_state(&self) -> StreamState {
        self.manager.state()
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn emit(&self, kind: EngineEventKind) {
        let _ = self.events_tx.send(EngineEvent::at(self.epoch, kind));
    }
}

impl Drop for MetronomeEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

cfg_if! {
    if #[cfg(target_os = "android")] {
        fn platform_backend() -> Arc<dyn AudioBackend> {
            Arc::new(crate::engine::backend::OboeBackend::new())
        }
    } else {
        fn platform_backend() -> Arc<dyn AudioBackend> {
            Arc::new(crate::engine::backend::CpalBackend::new())
        }
    }
}
