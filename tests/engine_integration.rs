//! Integration tests for the engine's public surface
//!
//! These run the full control plane (engine handle, stream manager, pattern
//! store, renderer, event bridges) on the offline backend, so the whole
//! pipeline is exercised without an audio device.

use std::sync::Arc;
use std::time::Duration;

use metronome_plus::audio::SampleBank;
use metronome_plus::engine::{MetronomeEngine, OfflineBackend};
use metronome_plus::error::{ConfigError, StreamError};
use metronome_plus::{BeatState, EngineConfig, EngineEventKind, PlaybackState};

fn offline_engine() -> MetronomeEngine {
    MetronomeEngine::with_backend(
        EngineConfig::default(),
        SampleBank::synthesized(EngineConfig::default().sample_rate),
        Arc::new(OfflineBackend::new()),
    )
    .expect("offline engine should initialize")
}

#[test]
fn test_engine_starts_on_the_default_measure() {
    let engine = offline_engine();
    let snapshot = engine.snapshot();

    assert_eq!(snapshot.bpm, 120);
    assert_eq!(
        snapshot.pattern.steps(),
        &[
            BeatState::Accent,
            BeatState::Normal,
            BeatState::Normal,
            BeatState::Normal
        ]
    );
    assert_eq!(engine.playback_state(), PlaybackState::Stopped);
}

#[test]
fn test_full_lifecycle_walks_cleanly() {
    let engine = offline_engine();

    engine.set_tempo(90).expect("tempo");
    engine
        .set_pattern(&[BeatState::Accent, BeatState::Normal])
        .expect("pattern");
    engine.play().expect("play");
    assert!(engine.is_playing());
    engine.pause().expect("pause");
    assert!(!engine.is_playing());
    engine.shutdown();

    assert_eq!(engine.play(), Err(StreamError::NotOpened));
}

#[test]
fn test_rejected_commands_do_not_disturb_playback() {
    let engine = offline_engine();
    engine.play().expect("play");

    assert_eq!(
        engine.set_tempo(0),
        Err(ConfigError::InvalidTempo { bpm: 0 })
    );
    assert_eq!(engine.set_pattern(&[]), Err(ConfigError::EmptyPattern));

    assert!(engine.is_playing(), "Playback survives rejected commands");
    assert_eq!(engine.snapshot().bpm, 120);
}

#[tokio::test]
async fn test_beats_reach_async_subscribers() {
    let engine = offline_engine();
    // One beat per 100ms keeps the wall-clock wait short.
    engine.set_tempo(600).expect("tempo");
    let mut beats = engine.subscribe_beats();

    engine.play().expect("play");
    let mut indices = Vec::new();
    for _ in 0..5 {
        let event = tokio::time::timeout(Duration::from_secs(2), beats.recv())
            .await
            .expect("beats should keep arriving")
            .expect("channel open");
        indices.push(event.beat_index);
    }
    engine.pause().expect("pause");

    // Indices advance by exactly one, modulo the 4-beat measure.
    for pair in indices.windows(2) {
        assert_eq!(pair[1], (pair[0] + 1) % 4);
    }
}

#[tokio::test]
async fn test_event_stream_adapter_delivers_telemetry() {
    use futures::StreamExt;

    let engine = offline_engine();
    let mut events = engine.events_stream();

    engine.set_tempo(150).expect("tempo");
    let event = tokio::time::timeout(Duration::from_secs(1), events.next())
        .await
        .expect("telemetry should arrive")
        .expect("stream open");
    assert_eq!(event.kind, EngineEventKind::TempoChanged { bpm: 150 });
}

#[test]
fn test_unbounded_bridge_works_without_a_runtime() {
    let engine = offline_engine();
    engine.set_tempo(600).expect("tempo");
    let mut beats = engine.beats_unbounded();

    engine.play().expect("play");
    let event = beats.blocking_recv().expect("a beat should arrive");
    assert_eq!(event.beat_index, 0);
    engine.pause().expect("pause");
}

#[test]
fn test_two_engines_are_independent() {
    let a = offline_engine();
    let b = offline_engine();

    a.set_tempo(100).expect("tempo");
    a.play().expect("play");

    assert_eq!(b.snapshot().bpm, 120, "Engines do not share state");
    assert!(!b.is_playing());

    a.shutdown();
    b.shutdown();
}
