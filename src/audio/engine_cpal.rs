//! AudioEngine - cpal-based output stream host for desktop platforms
//!
//! Owns the platform output stream and the renderer that feeds it. A
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated host
//! thread for its whole life; control threads talk to it through a command
//! channel with per-command reply handshakes.
//!
//! Architecture:
//! - Host thread: builds the stream around the [Renderer], then serves
//!   Start/Stop/Close commands until told to exit
//! - Render callback: [Renderer::render], lock-free and allocation-free
//! - Pump thread: drains the beat-event relay into the broadcast channel
//!
//! Opening returns only after the host thread has either built the stream
//! or reported why it could not, so callers see device errors synchronously.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error};
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

/// Desktop audio engine: one output stream on its own host thread.
pub struct AudioEngine {
    commands: mpsc::Sender<StreamCommand>,
    worker: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl AudioEngine {
    /// Open the default output device and stand up the render pipeline.
    ///
    /// The stream is created in a stopped state; call [`AudioEngine::start`]
    /// to begin callbacks. The device must accept the configured sample
    /// rate, channel count, and f32 samples.
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
        let (beat_tx, beat_rx) = beat_event_channel();
        let renderer = Renderer::new(store, bank, Arc::clone(&playing), session, beat_tx, &config);
        let pump = spawn_beat_pump(beat_rx, beats_tx);

        let (command_tx, command_rx) = mpsc::channel();
        let (boot_tx, boot_rx) = mpsc::channel();

        let worker = std::thread::Builder::new()
            .name("audio-stream-host".to_string())
            .spawn(move || {
                run_stream_host(
                    renderer, config, playing, errored, events_tx, epoch, command_rx, boot_tx,
                )
            })
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

    /// Pause stream callbacks. The stream stays open and can be restarted.
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
        // The pump exits on its own once the renderer (and with it the relay
        // producer) is dropped by the host thread.
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

#[allow(clippy::too_many_arguments)]
fn run_stream_host(
    renderer: Renderer,
    config: EngineConfig,
    playing: Arc<AtomicBool>,
    errored: Arc<AtomicBool>,
    events_tx: broadcast::Sender<EngineEvent>,
    epoch: Instant,
    commands: mpsc::Receiver<StreamCommand>,
    boot: mpsc::Sender<Result<(), StreamError>>,
) {
    let stream = match build_output_stream(renderer, &config, playing, errored, events_tx, epoch) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = boot.send(Err(err));
            return;
        }
    };

    if boot.send(Ok(())).is_err() {
        // Opener vanished before we could report; tear down quietly.
        return;
    }

    debug!("[AudioEngine] Stream host running");
    while let Ok(command) = commands.recv() {
        match command {
            StreamCommand::Start(reply) => {
                let result = stream.play().map_err(|e| StreamError::StartFailed {
                    reason: format!("{}", e),
                });
                let _ = reply.send(result);
            }
            StreamCommand::Stop(reply) => {
                let result = stream.pause().map_err(|e| StreamError::StopFailed {
                    reason: format!("{}", e),
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
    mut renderer: Renderer,
    config: &EngineConfig,
    playing: Arc<AtomicBool>,
    errored: Arc<AtomicBool>,
    events_tx: broadcast::Sender<EngineEvent>,
    epoch: Instant,
) -> Result<cpal::Stream, StreamError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(StreamError::NoOutputDevice)?;

    let supported = device
        .default_output_config()
        .map_err(|e| StreamError::OpenFailed {
            reason: format!("Failed to get default output config: {:?}", e),
        })?;

    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(StreamError::OpenFailed {
            reason: format!(
                "Only F32 output is supported, device offers {:?}",
                supported.sample_format()
            ),
        });
    }

    // Ask for the configured burst size when the device advertises a range
    // that contains it; otherwise let the device pick.
    let buffer_size = match supported.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max }
            if (*min..=*max).contains(&config.frames_per_burst) =>
        {
            cpal::BufferSize::Fixed(config.frames_per_burst)
        }
        _ => cpal::BufferSize::Default,
    };

    let stream_config = cpal::StreamConfig {
        channels: config.channel_count,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size,
    };

    let err_fn = move |err: cpal::StreamError| {
        error!("[AudioEngine] Output stream failed: {}", err);
        playing.store(false, Ordering::Release);
        errored.store(true, Ordering::Release);
        let _ = events_tx.send(EngineEvent::at(epoch, EngineEventKind::StreamFailed));
    };

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                renderer.render(data);
            },
            err_fn,
            None,
        )
        .map_err(|e| StreamError::OpenFailed {
            reason: format!("{:?}", e),
        })?;

    Ok(stream)
}
