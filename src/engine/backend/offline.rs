//! Offline backend - full render pipeline without an audio device
//!
//! Drives the [Renderer] from a paced worker thread instead of a platform
//! callback, discarding the rendered audio. Tests and the CLI's offline
//! mode use this where no output device exists. Wall-clock pacing is
//! approximate (thread sleeps one burst period per render), but beat
//! spacing within the rendered frames stays sample-accurate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::audio::event_relay::{beat_event_channel, spawn_beat_pump};
use crate::audio::render::Renderer;
use crate::error::{log_stream_error, StreamError};

use super::{AudioBackend, StreamContext};

struct OfflineWorker {
    run: Arc<AtomicBool>,
    render_thread: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

/// Backend that paces the renderer on a plain thread.
pub struct OfflineBackend {
    worker: Mutex<Option<OfflineWorker>>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self {
            worker: Mutex::new(None),
        }
    }

    fn lock_worker(&self) -> Result<MutexGuard<'_, Option<OfflineWorker>>, StreamError> {
        self.worker.lock().map_err(|_| {
            let err = StreamError::poisoned("offline_backend");
            log_stream_error(&err, "lock_worker");
            err
        })
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for OfflineBackend {
    fn open(&self, ctx: StreamContext) -> Result<(), StreamError> {
        let mut guard = self.lock_worker()?;
        if guard.is_some() {
            let err = StreamError::AlreadyOpened;
            log_stream_error(&err, "open");
            return Err(err);
        }

        let (beat_tx, beat_rx) = beat_event_channel();
        let mut renderer =
            Renderer::new(ctx.store, ctx.bank, ctx.playing, ctx.session, beat_tx, &ctx.config);
        let pump = spawn_beat_pump(beat_rx, ctx.beats_tx);

        let run = Arc::new(AtomicBool::new(true));
        let run_flag = Arc::clone(&run);
        let frames = ctx.config.frames_per_burst as usize;
        let channels = ctx.config.channel_count as usize;
        let period = Duration::from_secs_f64(frames as f64 / f64::from(ctx.config.sample_rate));

        let render_thread = std::thread::Builder::new()
            .name("offline-render".to_string())
            .spawn(move || {
                let mut buffer = vec![0.0f32; frames * channels];
                while run_flag.load(Ordering::Acquire) {
                    renderer.render(&mut buffer);
                    std::thread::sleep(period);
                }
            })
            .map_err(|e| StreamError::OpenFailed {
                reason: format!("Failed to spawn offline render thread: {}", e),
            })?;

        *guard = Some(OfflineWorker {
            run,
            render_thread: Some(render_thread),
            pump: Some(pump),
        });
        Ok(())
    }

    // The paced thread renders from open to close; whether output is
    // audible (and beats fire) is gated by the shared playing flag, so
    // start and stop only have to validate that a worker exists.
    fn start(&self) -> Result<(), StreamError> {
        let guard = self.lock_worker()?;
        if guard.is_none() {
            let err = StreamError::NotOpened;
            log_stream_error(&err, "start");
            return Err(err);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), StreamError> {
        let guard = self.lock_worker()?;
        if guard.is_none() {
            let err = StreamError::NotOpened;
            log_stream_error(&err, "stop");
            return Err(err);
        }
        Ok(())
    }

    fn close(&self) -> Result<(), StreamError> {
        let mut guard = self.lock_worker()?;
        if let Some(mut worker) = guard.take() {
            worker.run.store(false, Ordering::Release);
            if let Some(thread) = worker.render_thread.take() {
                let _ = thread.join();
            }
            // Pump exits once the render thread drops the relay producer.
            if let Some(pump) = worker.pump.take() {
                let _ = pump.join();
            }
        }
        Ok(())
    }
}
