//! AudioEngine - Oboe-based output stream host for Android
//!
//! Android counterpart of the cpal host: the Oboe output stream lives on a
//! dedicated host thread and is driven through the same Start/Stop/Close
//! command protocol. The stream is opened with AAudio low-latency settings
//! (LowLatency performance mode, Exclusive sharing) and f32 stereo frames.
//!
//! Real-time safety in the callback matches [Renderer]: the only extra work
//! here is copying the rendered interleaved buffer into Oboe's frame tuples
//! from a scratch buffer preallocated at open time.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Instant;

use log::{debug, error};
use oboe::{
    AudioOutputCallback, AudioOutputStreamSafe, AudioStream, AudioStreamAsync, AudioStreamBuilder,
    DataCallbackResult, Error, Output, PerformanceMode, SharingMode,
};
use tokio::sync::broadcast;

use super::event_relay::{beat_event_channel, spawn_beat_pump};
use super::pattern_store::PatternStore;
use super::render::Renderer;
use super::sample_bank::SampleBank;
use crate::config::EngineConfig;
use crate::error::StreamError;
use crate::model::{BeatEvent, EngineEvent, EngineEventKind};

enum StreamCommand {
    Start(mpsc::Sender<Result<(), StreamError>>),
    Stop(mpsc::Sender<Result<(), StreamError>>),
    Close,
}

/// Android audio engine: one Oboe output stream on its own host thread.
pub struct AudioEngine {
    commands: mpsc::Sender<StreamCommand>,
    worker: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl AudioEngine {
    /// Open the Oboe output stream and stand up the render pipeline.
    ///
    /// The stream is created in a stopped state; call [`AudioEngine::start`]
    /// to begin callbacks.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        store: Arc<PatternStore>,
        bank: Arc<SampleBank>,
        playing: Arc<AtomicBool>,
        session: Arc<AtomicU64>,
        errored: Arc<AtomicBool>,
        beats_tx: broadcast::Sender<BeatEvent>,
        events_tx: broadcast::Sender<EngineEvent>,
        epoch: Instant,
        config: EngineConfig,
    ) -> Result<Self, StreamError> {
        // The Oboe stream is built stereo regardless of what the config
        // carries; the renderer must interleave accordingly.
        let config = EngineConfig {
            channel_count: 2,
            ..config
        };

        let (beat_tx, beat_rx) = beat_event_channel();
        let renderer = Renderer::new(store, bank, Arc::clone(&playing), session, beat_tx, &config);
        let pump = spawn_beat_pump(beat_rx, beats_tx);

        let callback = OutputCallback::new(renderer, playing, errored, events_tx, epoch, &config);

        let (command_tx, command_rx) = mpsc::channel();
        let (boot_tx, boot_rx) = mpsc::channel();

        let worker = std::thread::Builder::new()
            .name("audio-stream-host".to_string())
            .spawn(move || run_stream_host(callback, config, command_rx, boot_tx))
            .map_err(|e| StreamError::OpenFailed {
                reason: format!("Failed to spawn stream host thread: {}", e),
            })?;

        match boot_rx.recv() {
            Ok(Ok(())) => Ok(AudioEngine {
                commands: command_tx,
                worker: Some(worker),
                pump: Some(pump),
            }),
            Ok(Err(err)) => {
                let _ = worker.join();
                let _ = pump.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                let _ = pump.join();
                Err(StreamError::WorkerGone)
            }
        }
    }

    /// Start stream callbacks.
    pub fn start(&self) -> Result<(), StreamError> {
        self.command(StreamCommand::Start)
    }

    /// Stop stream callbacks. The stream stays open and can be restarted.
    pub fn stop(&self) -> Result<(), StreamError> {
        self.command(StreamCommand::Stop)
    }

    /// Tear down the stream and both helper threads.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn command(
        &self,
        make: impl FnOnce(mpsc::Sender<Result<(), StreamError>>) -> StreamCommand,
    ) -> Result<(), StreamError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| StreamError::WorkerGone)?;
        reply_rx.recv().map_err(|_| StreamError::WorkerGone)?
    }

    fn shutdown(&mut self) {
        let _ = self.commands.send(StreamCommand::Close);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("[AudioEngine] Stream host thread panicked during close");
            }
        }
        if let Some(pump) = self.pump.take() {
            if pump.join().is_err() {
                error!("[AudioEngine] Beat pump thread panicked during close");
            }
        }
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_stream_host(
    callback: OutputCallback,
    config: EngineConfig,
    commands: mpsc::Receiver<StreamCommand>,
    boot: mpsc::Sender<Result<(), StreamError>>,
) {
    let mut stream = match build_output_stream(callback, &config) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = boot.send(Err(err));
            return;
        }
    };

    if boot.send(Ok(())).is_err() {
        return;
    }

    debug!("[AudioEngine] Stream host running");
    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Start(reply) => {
                let result = stream.start().map_err(|e| StreamError::StartFailed {
                    reason: format!("{:?}", e),
                });
                let _ = reply.send(result);
            }
            StreamCommand::Stop(reply) => {
                let result = stream.stop().map_err(|e| StreamError::StopFailed {
                    reason: format!("{:?}", e),
                });
                let _ = reply.send(result);
            }
            StreamCommand::Close => break,
        }
    }

    drop(stream);
    debug!("[AudioEngine] Stream host exited");
}

fn build_output_stream(
    callback: OutputCallback,
    config: &EngineConfig,
) -> Result<AudioStreamAsync<Output, OutputCallback>, StreamError> {
    AudioStreamBuilder::default()
        .set_performance_mode(PerformanceMode::LowLatency)
        .set_sharing_mode(SharingMode::Exclusive)
        .set_direction::<Output>()
        .set_sample_rate(config.sample_rate as i32)
        .set_frames_per_callback(config.frames_per_burst as i32)
        .set_channel_count::<oboe::Stereo>()
        .set_format::<f32>()
        .set_callback(callback)
        .open_stream()
        .map_err(|e| StreamError::OpenFailed {
            reason: format!("Output stream: {:?}", e),
        })
}

/// Oboe output callback wrapping the renderer.
///
/// Renders into an interleaved scratch buffer, then copies into Oboe's
/// stereo frame tuples. The scratch buffer is sized at open time and only
/// grows if the device enlarges its burst.
pub struct OutputCallback {
    renderer: Renderer,
    scratch: Vec<f32>,
    playing: Arc<AtomicBool>,
    errored: Arc<AtomicBool>,
    events_tx: broadcast::Sender<EngineEvent>,
    epoch: Instant,
}

impl OutputCallback {
    fn new(
        renderer: Renderer,
        playing: Arc<AtomicBool>,
        errored: Arc<AtomicBool>,
        events_tx: broadcast::Sender<EngineEvent>,
        epoch: Instant,
        config: &EngineConfig,
    ) -> Self {
        // Headroom for AAudio burst doubling after underruns, so the render
        // path never reallocates in practice.
        let scratch = vec![0.0f32; config.frames_per_burst as usize * 2 * 4];
        Self {
            renderer,
            scratch,
            playing,
            errored,
            events_tx,
            epoch,
        }
    }
}

impl AudioOutputCallback for OutputCallback {
    type FrameType = (f32, oboe::Stereo);

    fn on_audio_ready(
        &mut self,
        _stream: &mut dyn AudioOutputStreamSafe,
        frames: &mut [(f32, f32)],
    ) -> DataCallbackResult {
        let needed = frames.len() * 2;
        if self.scratch.len() < needed {
            self.scratch.resize(needed, 0.0);
        }

        let scratch = &mut self.scratch[..needed];
        self.renderer.render(scratch);

        for (frame, rendered) in frames.iter_mut().zip(scratch.chunks_exact(2)) {
            frame.0 = rendered[0];
            frame.1 = rendered[1];
        }

        DataCallbackResult::Continue
    }

    fn on_error_before_close(&mut self, _stream: &mut dyn AudioOutputStreamSafe, error: Error) {
        error!("[AudioEngine] Output stream failed: {:?}", error);
        self.playing.store(false, Ordering::Release);
        self.errored.store(true, Ordering::Release);
        let _ = self
            .events_tx
            .send(EngineEvent::at(self.epoch, EngineEventKind::StreamFailed));
    }
}
