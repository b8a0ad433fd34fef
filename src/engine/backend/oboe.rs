//! Oboe-based audio backend for Android
//!
//! Thin adapter between the [AudioBackend] trait and the Oboe stream host.

use std::sync::{Mutex, MutexGuard};

use crate::audio::engine_oboe::AudioEngine;
use crate::error::{log_stream_error, StreamError};

use super::{AudioBackend, StreamContext};

/// Android backend that drives the Oboe-powered audio engine.
pub struct OboeBackend {
    engine: Mutex<Option<AudioEngine>>,
}

impl OboeBackend {
    pub fn new() -> Self {
        Self {
            engine: Mutex::new(None),
        }
    }

    fn lock_engine(&self) -> Result<MutexGuard<'_, Option<AudioEngine>>, StreamError> {
        self.engine.lock().map_err(|_| {
            let err = StreamError::poisoned("oboe_backend");
            log_stream_error(&err, "lock_engine");
            err
        })
    }
}

impl Default for OboeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OboeBackend {
    fn open(&self, ctx: StreamContext) -> Result<(), StreamError> {
        let mut guard = self.lock_engine()?;
        if guard.is_some() {
            let err = StreamError::AlreadyOpened;
            log_stream_error(&err, "open");
            return Err(err);
        }

        let engine = AudioEngine::open(
            ctx.store, ctx.bank, ctx.playing, ctx.session, ctx.errored, ctx.beats_tx,
            ctx.events_tx, ctx.epoch, ctx.config,
        )
        .map_err(|err| {
            log_stream_error(&err, "open");
            err
        })?;

        *guard = Some(engine);
        Ok(())
    }

    fn start(&self) -> Result<(), StreamError> {
        let guard = self.lock_engine()?;
        let engine = guard.as_ref().ok_or_else(|| {
            let err = StreamError::NotOpened;
            log_stream_error(&err, "start");
            err
        })?;
        engine.start()
    }

    fn stop(&self) -> Result<(), StreamError> {
        let guard = self.lock_engine()?;
        let engine = guard.as_ref().ok_or_else(|| {
            let err = StreamError::NotOpened;
            log_stream_error(&err, "stop");
            err
        })?;
        engine.stop()
    }

    fn close(&self) -> Result<(), StreamError> {
        let mut guard = self.lock_engine()?;
        if let Some(engine) = guard.take() {
            engine.close();
        }
        Ok(())
    }
}
