//! StreamManager: the stream lifecycle state machine
//!
//! One explicit state machine sits above every audio backend, so the
//! platform engines only defend invariants they cannot survive violating
//! and all transition validation lives (and is tested) here:
//!
//! ```text
//! Closed --open()--> Opened --start()--> Started
//! Started --stop()--> Opened --close()--> Closed
//! any state --async stream error--> Errored --start()--> Started (recovery)
//! ```
//!
//! The manager owns the playback flag the render thread reads, the session
//! counter that tells the renderer to restart at beat 0, and the error latch
//! the backends set from their stream-error paths. `stop` clears the playback
//! flag before pausing the stream, so output is silent on the very next
//! callback regardless of how quickly the platform honors the pause.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::{info, warn};
use tokio::sync::broadcast;

use crate::audio::pattern_store::PatternStore;
use crate::audio::sample_bank::SampleBank;
use crate::config::EngineConfig;
use crate::engine::backend::{AudioBackend, StreamContext};
use crate::error::{log_stream_error, StreamError};
use crate::model::{BeatEvent, EngineEvent, PlaybackState};

/// Lifecycle states of the output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No stream exists
    Closed,
    /// Stream built, callbacks not running
    Opened,
    /// Callbacks running
    Started,
    /// The stream died asynchronously; `start()` runs recovery
    Errored,
}

/// Everything the manager needs to (re)build a [StreamContext].
///
/// Kept by the manager from `open` until `close` so that recovery from
/// `Errored` can rebuild the stream without the caller's involvement.
#[derive(Clone)]
pub struct StreamResources {
    pub config: EngineConfig,
    pub store: Arc<PatternStore>,
    pub bank: Arc<SampleBank>,
    pub beats_tx: broadcast::Sender<BeatEvent>,
    pub events_tx: broadcast::Sender<EngineEvent>,
    pub epoch: Instant,
}

struct ManagerState {
    state: StreamState,
    resources: Option<StreamResources>,
}

/// Manages the output stream lifecycle over an [AudioBackend].
pub struct StreamManager {
    backend: Arc<dyn AudioBackend>,
    inner: Mutex<ManagerState>,
    playing: Arc<AtomicBool>,
    session: Arc<AtomicU64>,
    errored: Arc<AtomicBool>,
}

impl StreamManager {
    pub fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            inner: Mutex::new(ManagerState {
                state: StreamState::Closed,
                resources: None,
            }),
            playing: Arc::new(AtomicBool::new(false)),
            session: Arc::new(AtomicU64::new(0)),
            errored: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Build the output stream. From `Closed` this is a plain open; from
    /// `Errored` the dead handle is closed first so every successful open
    /// stays paired with exactly one close.
    ///
    /// # Errors
    /// `AlreadyOpened` from `Opened`/`Started`; backend errors pass through.
    pub fn open(&self, resources: StreamResources) -> Result<(), StreamError> {
        let mut inner = self.lock_inner()?;
        self.latch_async_error(&mut inner);

        match inner.state {
            StreamState::Opened | StreamState::Started => {
                let err = StreamError::AlreadyOpened;
                log_stream_error(&err, "open");
                Err(err)
            }
            StreamState::Errored => {
                self.reopen(&mut inner, resources)
            }
            StreamState::Closed => {
                self.backend.open(self.make_context(&resources))?;
                inner.resources = Some(resources);
                inner.state = StreamState::Opened;
                info!("[StreamManager] Stream opened");
                Ok(())
            }
        }
    }

    /// Start callbacks and mark playback running. Playback always restarts
    /// at beat 0: the session counter is bumped before the playing flag is
    /// set, and the renderer resets its transport when it sees the change.
    ///
    /// # Errors
    /// `NotOpened` from `Closed`, `AlreadyStarted` from `Started`. From
    /// `Errored` this runs the recovery path (close, reopen, start) and
    /// returns the first failure, leaving the machine in `Errored`.
    pub fn start(&self) -> Result<(), StreamError> {
        let mut inner = self.lock_inner()?;
        self.latch_async_error(&mut inner);

        match inner.state {
            StreamState::Closed => {
                let err = StreamError::NotOpened;
                log_stream_error(&err, "start");
                Err(err)
            }
            StreamState::Started => {
                let err = StreamError::AlreadyStarted;
                log_stream_error(&err, "start");
                Err(err)
            }
            StreamState::Errored => {
                let resources = inner.resources.clone().ok_or_else(|| {
                    let err = StreamError::NotOpened;
                    log_stream_error(&err, "start");
                    err
                })?;
                self.reopen(&mut inner, resources)?;
                self.begin_playback(&mut inner)
            }
            StreamState::Opened => self.begin_playback(&mut inner),
        }
    }

    /// Stop playback. The playing flag is cleared before the stream is
    /// paused, so the next callback renders silence even if the platform
    /// pause is slow.
    ///
    /// # Errors
    /// `NotStarted` unless the machine is in `Started`.
    pub fn stop(&self) -> Result<(), StreamError> {
        let mut inner = self.lock_inner()?;
        self.latch_async_error(&mut inner);

        if inner.state != StreamState::Started {
            let err = StreamError::NotStarted;
            log_stream_error(&err, "stop");
            return Err(err);
        }

        self.playing.store(false, Ordering::Release);
        match self.backend.stop() {
            Ok(()) => {
                inner.state = StreamState::Opened;
                info!("[StreamManager] Stream stopped");
                Ok(())
            }
            Err(err) => {
                inner.state = StreamState::Errored;
                log_stream_error(&err, "stop");
                Err(err)
            }
        }
    }

    /// Tear down the stream. Idempotent; joins the backend's stream owner
    /// thread, which in turn waits out any in-flight render callback before
    /// the render resources are released.
    pub fn close(&self) {
        let mut inner = match self.lock_inner() {
            Ok(inner) => inner,
            // Poisoned on a panicking thread; still release the stream.
            Err(_) => {
                self.playing.store(false, Ordering::Release);
                let _ = self.backend.close();
                return;
            }
        };

        if inner.state == StreamState::Closed {
            return;
        }

        self.playing.store(false, Ordering::Release);
        if let Err(err) = self.backend.close() {
            warn!("[StreamManager] Backend close reported: {}", err);
        }
        self.errored.store(false, Ordering::Release);
        inner.resources = None;
        inner.state = StreamState::Closed;
        info!("[StreamManager] Stream closed");
    }

    /// Current lifecycle state, with any pending async error latched in.
    pub fn state(&self) -> StreamState {
        match self.lock_inner() {
            Ok(mut inner) => {
                self.latch_async_error(&mut inner);
                inner.state
            }
            Err(_) => StreamState::Errored,
        }
    }

    /// Control-plane view of the render thread's playback flag.
    pub fn playback_state(&self) -> PlaybackState {
        PlaybackState::from_flag(self.playing.load(Ordering::Acquire))
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// The playback flag shared with the render thread.
    pub fn playing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.playing)
    }

    /// The session counter shared with the render thread.
    pub fn session_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.session)
    }

    /// The error latch shared with the backends' error callbacks.
    pub fn error_latch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.errored)
    }

    fn begin_playback(&self, inner: &mut MutexGuard<'_, ManagerState>) -> Result<(), StreamError> {
        self.backend.start().map_err(|err| {
            log_stream_error(&err, "start");
            err
        })?;
        // Session first: the renderer must observe the bump no later than
        // the flag flip that makes it render.
        self.session.fetch_add(1, Ordering::AcqRel);
        self.playing.store(true, Ordering::Release);
        inner.state = StreamState::Started;
        info!("[StreamManager] Stream started");
        Ok(())
    }

    // Recovery: release the dead handle, clear the latch, rebuild. On any
    // failure the machine stays in Errored and keeps its resources so the
    // control plane can retry.
    fn reopen(
        &self,
        inner: &mut MutexGuard<'_, ManagerState>,
        resources: StreamResources,
    ) -> Result<(), StreamError> {
        info!("[StreamManager] Recovering errored stream");
        if let Err(err) = self.backend.close() {
            warn!("[StreamManager] Closing dead stream reported: {}", err);
        }
        self.errored.store(false, Ordering::Release);

        match self.backend.open(self.make_context(&resources)) {
            Ok(()) => {
                inner.resources = Some(resources);
                inner.state = StreamState::Opened;
                Ok(())
            }
            Err(err) => {
                inner.resources = Some(resources);
                inner.state = StreamState::Errored;
                log_stream_error(&err, "reopen");
                Err(err)
            }
        }
    }

    fn make_context(&self, resources: &StreamResources) -> StreamContext {
        StreamContext {
            config: resources.config,
            store: Arc::clone(&resources.store),
            bank: Arc::clone(&resources.bank),
            playing: Arc::clone(&self.playing),
            session: Arc::clone(&self.session),
            errored: Arc::clone(&self.errored),
            beats_tx: resources.beats_tx.clone(),
            events_tx: resources.events_tx.clone(),
            epoch: resources.epoch,
        }
    }

    // The backends latch `errored` from their stream-error callbacks; fold
    // that into the state machine before interpreting any command.
    fn latch_async_error(&self, inner: &mut MutexGuard<'_, ManagerState>) {
        if self.errored.load(Ordering::Acquire) && inner.state != StreamState::Closed {
            if inner.state != StreamState::Errored {
                warn!("[StreamManager] Stream failed asynchronously; entering Errored");
            }
            inner.state = StreamState::Errored;
        }
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, ManagerState>, StreamError> {
        self.inner.lock().map_err(|_| {
            let err = StreamError::poisoned("stream_manager");
            log_stream_error(&err, "lock_inner");
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::OfflineBackend;
    use crate::model::Pattern;

    fn resources(bpm: u32) -> StreamResources {
        let (beats_tx, _) = broadcast::channel(128);
        let (events_tx, _) = broadcast::channel(128);
        StreamResources {
            config: EngineConfig::default(),
            store: Arc::new(PatternStore::with_initial(bpm, Pattern::default()).unwrap()),
            bank: Arc::new(SampleBank::empty()),
            beats_tx,
            events_tx,
            epoch: Instant::now(),
        }
    }

    fn offline_manager() -> StreamManager {
        StreamManager::new(Arc::new(OfflineBackend::new()))
    }

    #[test]
    fn test_state_machine_walk() {
        let manager = offline_manager();
        assert_eq!(manager.state(), StreamState::Closed);

        manager.open(resources(120)).expect("open from Closed");
        assert_eq!(manager.state(), StreamState::Opened);
        assert!(!manager.is_playing());

        manager.start().expect("start from Opened");
        assert_eq!(manager.state(), StreamState::Started);
        assert!(manager.is_playing());
        assert_eq!(manager.playback_state(), PlaybackState::Playing);

        manager.stop().expect("stop from Started");
        assert_eq!(manager.state(), StreamState::Opened);
        assert!(!manager.is_playing());

        manager.close();
        assert_eq!(manager.state(), StreamState::Closed);
    }

    #[test]
    fn test_start_from_closed_is_not_opened() {
        let manager = offline_manager();
        assert_eq!(manager.start(), Err(StreamError::NotOpened));
        assert!(!manager.is_playing());
    }

    #[test]
    fn test_double_start_and_double_stop() {
        let manager = offline_manager();
        manager.open(resources(120)).unwrap();
        manager.start().unwrap();

        assert_eq!(manager.start(), Err(StreamError::AlreadyStarted));
        assert_eq!(
            manager.state(),
            StreamState::Started,
            "Rejected start must not disturb the machine"
        );

        manager.stop().unwrap();
        assert_eq!(manager.stop(), Err(StreamError::NotStarted));
        manager.close();
    }

    #[test]
    fn test_double_open_is_rejected() {
        let manager = offline_manager();
        manager.open(resources(120)).unwrap();
        assert_eq!(manager.open(resources(120)), Err(StreamError::AlreadyOpened));
        manager.close();
    }

    #[test]
    fn test_close_is_idempotent() {
        let manager = offline_manager();
        manager.open(resources(120)).unwrap();
        manager.close();
        manager.close();
        assert_eq!(manager.state(), StreamState::Closed);
    }

    #[test]
    fn test_session_bumps_on_every_start() {
        let manager = offline_manager();
        let session = manager.session_counter();
        manager.open(resources(120)).unwrap();

        manager.start().unwrap();
        let first = session.load(Ordering::Acquire);
        manager.stop().unwrap();
        manager.start().unwrap();
        let second = session.load(Ordering::Acquire);

        assert!(second > first, "Each start must bump the session");
        manager.close();
    }

    #[test]
    fn test_async_error_latches_and_start_recovers() {
        let manager = offline_manager();
        manager.open(resources(120)).unwrap();
        manager.start().unwrap();

        // Simulate the backend's stream-error callback firing.
        manager.error_latch().store(true, Ordering::Release);
        manager.playing_flag().store(false, Ordering::Release);

        assert_eq!(manager.state(), StreamState::Errored);
        assert_eq!(manager.stop(), Err(StreamError::NotStarted));

        // The explicit retry path: start() from Errored reopens and starts.
        manager.start().expect("recovery start should succeed");
        assert_eq!(manager.state(), StreamState::Started);
        assert!(manager.is_playing());
        manager.close();
    }

    #[test]
    fn test_close_clears_error_latch() {
        let manager = offline_manager();
        manager.open(resources(120)).unwrap();
        manager.error_latch().store(true, Ordering::Release);
        assert_eq!(manager.state(), StreamState::Errored);

        manager.close();
        assert_eq!(manager.state(), StreamState::Closed);

        // A fresh open starts from a clean slate.
        manager.open(resources(120)).unwrap();
        assert_eq!(manager.state(), StreamState::Opened);
        manager.close();
    }
}
