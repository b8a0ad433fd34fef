//! Renderer - the real-time callback core
//!
//! This is the code that runs inside the platform audio callback. It owns
//! the transport (playhead, beat bookkeeping, click voices) and produces
//! interleaved f32 output.
//!
//! # Real-Time Safety
//! Everything on the render path is:
//! - Lock-free: two atomic counter loads and one atomic snapshot pointer
//!   load per callback
//! - Allocation-free: voices are fixed slots, click buffers are pre-decoded
//! - Non-blocking: beat events go out through a wait-free ring push
//!
//! The only reference-count traffic is cloning the snapshot `Arc` when a new
//! configuration is adopted at a beat boundary, and possibly dropping the
//! superseded one.
//!
//! # Timing model
//! The playhead counts frames since `play()`. Beat positions are computed
//! against a timing epoch (frame and beat counts captured at the last
//! snapshot adoption), so a tempo change rebases the arithmetic instead of
//! re-interpreting frames already rendered: the in-flight beat keeps its
//! old duration, and the new samples-per-beat applies from the boundary
//! where the snapshot is adopted.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::audio::beat_clock::{beat_index, beat_position, samples_per_beat};
use crate::audio::event_relay::BeatEventSender;
use crate::audio::pattern_store::{PatternStore, Snapshot};
use crate::audio::sample_bank::SampleBank;
use crate::config::EngineConfig;
use crate::model::{BeatEvent, BeatState};

/// Per-state click playback positions. `None` means idle; at most one voice
/// per beat state, re-triggering restarts it from the top (matching the
/// one-player-per-sound behavior of the app this engine ships in).
type Voices = [Option<usize>; BeatState::COUNT];

/// The render-thread state machine.
///
/// Constructed on the control thread, then moved into the platform callback.
/// All transport fields are owned by the render thread; the only shared
/// state is the playing flag, the pattern store, and the event ring.
pub struct Renderer {
    store: Arc<PatternStore>,
    bank: Arc<SampleBank>,
    playing: Arc<AtomicBool>,
    session: Arc<AtomicU64>,
    events: BeatEventSender,
    sample_rate: u32,
    channel_count: usize,

    // Transport, render-thread owned
    playhead: u64,
    epoch_frames: u64,
    epoch_beats: u64,
    active: Arc<Snapshot>,
    spb: u64,
    last_beat: Option<u64>,
    voices: Voices,
    last_session: u64,
}

impl Renderer {
    pub fn new(
        store: Arc<PatternStore>,
        bank: Arc<SampleBank>,
        playing: Arc<AtomicBool>,
        session: Arc<AtomicU64>,
        events: BeatEventSender,
        config: &EngineConfig,
    ) -> Self {
        let active = store.load_full();
        let spb = samples_per_beat(active.bpm, config.sample_rate);
        Self {
            store,
            bank,
            playing,
            session,
            events,
            sample_rate: config.sample_rate,
            channel_count: config.channel_count as usize,
            playhead: 0,
            epoch_frames: 0,
            epoch_beats: 0,
            active,
            spb,
            last_beat: None,
            voices: [None; BeatState::COUNT],
            last_session: 0,
        }
    }

    /// Frames rendered since playback started.
    pub fn playhead(&self) -> u64 {
        self.playhead
    }

    /// Render one callback worth of interleaved output.
    ///
    /// When stopped this writes silence and resets the transport, so a
    /// `pause()` is audible on the very next callback and the following
    /// `play()` restarts at beat 0. While playing, the current snapshot is
    /// loaded once and beat boundaries are detected per frame, exact to the
    /// frame regardless of how they align with the buffer.
    pub fn render(&mut self, output: &mut [f32]) {
        debug_assert_eq!(output.len() % self.channel_count, 0);

        if !self.playing.load(Ordering::Acquire) {
            output.fill(0.0);
            self.reset_transport();
            return;
        }

        // Each play() bumps the session counter. The platform may halt
        // callbacks before a stopped render ever runs, so a session change
        // is what guarantees playback restarts at beat 0.
        let session = self.session.load(Ordering::Acquire);
        if session != self.last_session {
            self.reset_transport();
            self.last_session = session;
        }

        let current = self.store.load();

        for frame in output.chunks_exact_mut(self.channel_count) {
            let elapsed = self.playhead - self.epoch_frames;
            let (beats, phase) = beat_position(elapsed, self.spb);
            let beat_number = self.epoch_beats + beats;

            if phase == 0 && self.last_beat != Some(beat_number) {
                // Adopt a newer snapshot before interpreting this beat, so
                // the new tempo and pattern apply from this onset on.
                if current.generation != self.active.generation {
                    self.active = Arc::clone(&current);
                    self.spb = samples_per_beat(self.active.bpm, self.sample_rate);
                    self.epoch_frames = self.playhead;
                    self.epoch_beats = beat_number;
                }
                self.begin_beat(beat_number);
            }

            let mixed = self.mix_voices().clamp(-1.0, 1.0);
            frame.fill(mixed);

            self.playhead += 1;
        }
    }

    /// Emit the beat event and start the click voice for this onset.
    fn begin_beat(&mut self, beat_number: u64) {
        self.last_beat = Some(beat_number);

        let index = beat_index(beat_number, self.active.pattern.len());
        let state = self.active.pattern.step(index);

        self.events.send(BeatEvent {
            beat_index: index as u32,
            generation: self.active.generation,
        });

        // Silence emits the event but no audio; so does a state whose
        // sample failed to load.
        if state != BeatState::Silence && self.bank.get_slot(state.slot()).is_some() {
            self.voices[state.slot()] = Some(0);
        }
    }

    /// Sum all ringing clicks for one frame.
    fn mix_voices(&mut self) -> f32 {
        let mut mixed = 0.0f32;
        for (slot, voice) in self.voices.iter_mut().enumerate() {
            if let Some(pos) = *voice {
                match self.bank.get_slot(slot) {
                    Some(sample) if pos < sample.len() => {
                        mixed += sample.samples()[pos];
                        *voice = Some(pos + 1);
                    }
                    _ => *voice = None,
                }
            }
        }
        mixed
    }

    fn reset_transport(&mut self) {
        self.playhead = 0;
        self.epoch_frames = 0;
        self.epoch_beats = 0;
        self.last_beat = None;
        self.voices = [None; BeatState::COUNT];
    }
}
