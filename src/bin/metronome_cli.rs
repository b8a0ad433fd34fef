use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use metronome_plus::audio::beat_clock::samples_per_beat;
use metronome_plus::audio::{beat_event_channel, PatternStore, Renderer, SampleBank};
use metronome_plus::config::EngineConfig;
use metronome_plus::engine::{MetronomeEngine, OfflineBackend};
use metronome_plus::model::{BeatEvent, BeatState, Pattern};
use metronome_plus::providers::WavClickProvider;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "metronome_cli",
    about = "Desktop playback and offline render harness for the metronome engine"
)]
struct Cli {
    /// Override directory containing click WAV assets (synthesized clicks otherwise)
    #[arg(long)]
    clicks_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Play through the system output and stream beat events to stdout
    Play {
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        /// Measure as letters: a=accent, n=normal, m=medium, s=silence (default "annn")
        #[arg(long)]
        pattern: Option<String>,
        /// Number of beats to play before exiting (0 = until interrupted)
        #[arg(long, default_value_t = 8)]
        beats: u32,
        /// Drive the paced offline backend instead of the sound card
        #[arg(long)]
        offline: bool,
    },
    /// Render a deterministic WAV without touching the audio device
    Render {
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        #[arg(long)]
        pattern: Option<String>,
        /// Number of full measures to render
        #[arg(long, default_value_t = 4)]
        bars: u32,
        #[arg(long)]
        output: PathBuf,
        /// Write a JSON beat report alongside the audio
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    metronome_plus::init_logging();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = EngineConfig::default();
    let bank = build_bank(cli.clicks_dir.as_deref(), config.sample_rate);

    match cli.command {
        Commands::Play {
            bpm,
            pattern,
            beats,
            offline,
        } => run_play(config, bank, bpm, pattern.as_deref(), beats, offline),
        Commands::Render {
            bpm,
            pattern,
            bars,
            output,
            report,
        } => run_render(config, bank, bpm, pattern.as_deref(), bars, output, report),
    }
}

fn build_bank(clicks_dir: Option<&std::path::Path>, sample_rate: u32) -> SampleBank {
    match clicks_dir {
        Some(dir) => {
            let provider = WavClickProvider::new(dir);
            SampleBank::from_provider(&provider, sample_rate)
        }
        None => SampleBank::synthesized(sample_rate),
    }
}

/// Parse a measure from per-beat letters, e.g. "anns".
fn parse_pattern(text: &str) -> Result<Pattern> {
    let mut steps = Vec::with_capacity(text.len());
    for letter in text.chars() {
        let state = match letter.to_ascii_lowercase() {
            'a' => BeatState::Accent,
            'n' => BeatState::Normal,
            'm' => BeatState::Medium,
            's' => BeatState::Silence,
            other => bail!("unknown beat letter '{other}' (use a, n, m, or s)"),
        };
        steps.push(state);
    }
    Pattern::new(steps).context("pattern must have at least one beat")
}

fn run_play(
    config: EngineConfig,
    bank: SampleBank,
    bpm: u32,
    pattern: Option<&str>,
    beats: u32,
    offline: bool,
) -> Result<ExitCode> {
    let engine = if offline {
        MetronomeEngine::with_backend(config, bank, Arc::new(OfflineBackend::new()))
    } else {
        MetronomeEngine::initialize(config, bank)
    }
    .context("initializing the engine")?;

    engine.set_tempo(bpm).context("setting tempo")?;
    if let Some(text) = pattern {
        let pattern = parse_pattern(text)?;
        engine
            .set_pattern(pattern.steps())
            .context("setting pattern")?;
    }

    let mut events = engine.beats_unbounded();
    engine.play().context("starting playback")?;

    let mut delivered = 0u32;
    while let Some(event) = events.blocking_recv() {
        println!("{}", serde_json::to_string(&event)?);
        delivered += 1;
        if beats != 0 && delivered >= beats {
            break;
        }
    }

    engine.pause().context("stopping playback")?;
    engine.shutdown();
    Ok(ExitCode::from(0))
}

fn run_render(
    config: EngineConfig,
    bank: SampleBank,
    bpm: u32,
    pattern: Option<&str>,
    bars: u32,
    output: PathBuf,
    report: Option<PathBuf>,
) -> Result<ExitCode> {
    let pattern = match pattern {
        Some(text) => parse_pattern(text)?,
        None => Pattern::default(),
    };
    let beat_count = pattern.len() as u64 * bars as u64;
    let total_frames = samples_per_beat(bpm, config.sample_rate) * beat_count;

    // Drive the renderer directly: same code the audio callback runs, but
    // clocked by this loop, so the output is byte-stable.
    let store = Arc::new(
        PatternStore::with_initial(bpm, pattern.clone()).context("building the pattern store")?,
    );
    let playing = Arc::new(AtomicBool::new(true));
    let session = Arc::new(AtomicU64::new(1));
    let (beat_tx, mut beat_rx) = beat_event_channel();
    let mut renderer = Renderer::new(
        store,
        Arc::new(bank),
        playing,
        session,
        beat_tx,
        &config,
    );

    let spec = hound::WavSpec {
        channels: config.channel_count,
        sample_rate: config.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&output, spec)
        .with_context(|| format!("creating {}", output.display()))?;

    let mut events: Vec<RenderedBeat> = Vec::new();
    let mut buffer = vec![0.0f32; config.frames_per_burst as usize * config.channel_count as usize];
    let mut rendered = 0u64;
    while rendered < total_frames {
        let burst_start = renderer.playhead();
        renderer.render(&mut buffer);
        let frames = (buffer.len() / config.channel_count as usize) as u64;
        let keep = (total_frames - rendered).min(frames) as usize;
        for &sample in &buffer[..keep * config.channel_count as usize] {
            writer.write_sample(sample)?;
        }
        while let Some(event) = beat_rx.pop() {
            events.push(RenderedBeat {
                frame: burst_start,
                event,
            });
        }
        rendered += frames;
    }
    writer.finalize().context("finalizing the WAV")?;

    if let Some(path) = report {
        let payload = RenderReport {
            bpm,
            sample_rate: config.sample_rate,
            frames: total_frames,
            beat_count,
            beats: &events,
        };
        let json = serde_json::to_string_pretty(&payload)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    println!(
        "Rendered {} beats ({} frames) to {}",
        beat_count,
        total_frames,
        output.display()
    );
    Ok(ExitCode::from(0))
}

/// A beat onset located to the burst in which it fired.
#[derive(Serialize)]
struct RenderedBeat {
    frame: u64,
    #[serde(flatten)]
    event: BeatEvent,
}

#[derive(Serialize)]
struct RenderReport<'a> {
    bpm: u32,
    sample_rate: u32,
    frames: u64,
    beat_count: u64,
    beats: &'a [RenderedBeat],
}
