//! Sample bank - immutable per-beat-state click buffers
//!
//! This module owns the decoded click audio the render thread plays at beat
//! onsets. Key properties:
//! - All decoding and allocation happens before the stream starts
//! - Buffers are mono f32 at the engine sample rate; no runtime resampling
//! - A state without a usable buffer renders silence; timing and beat events
//!   continue unaffected
//! - The bank is never mutated after engine construction, so the render
//!   thread reads it without synchronization

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::error::{ErrorCode, InitError};
use crate::model::BeatState;
use crate::providers::ClickSampleProvider;

/// Duration of the deterministic noise click in milliseconds
const NOISE_CLICK_MS: f32 = 20.0;

/// Envelope decay rate for synthesized clicks, per second
const DECAY_PER_SECOND: f32 = 250.0;

/// Generates a deterministic white noise click.
///
/// Fixed-seed noise scaled to half amplitude; identical output across calls,
/// which keeps offline renders and tests byte-stable.
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz (typically 48000)
///
/// # Returns
/// 20ms of noise samples in range [-0.5, 0.5]
pub fn noise_click(sample_rate: u32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * NOISE_CLICK_MS / 1000.0) as usize;
    let mut rng = StdRng::seed_from_u64(42);

    let mut samples = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        samples.push(rng.gen_range(-1.0..1.0) * 0.5);
    }
    samples
}

/// Generates a decaying sine click.
///
/// # Arguments
/// * `sample_rate` - Sample rate in Hz
/// * `freq_hz` - Oscillator frequency
/// * `duration_ms` - Click length in milliseconds
/// * `amplitude` - Peak amplitude scale (0.0 to 1.0)
pub fn sine_click(sample_rate: u32, freq_hz: f32, duration_ms: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (sample_rate as f32 * duration_ms / 1000.0) as usize;

    let mut samples = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let envelope = (-t * DECAY_PER_SECOND).exp();
        samples.push((t * freq_hz * std::f32::consts::TAU).sin() * envelope * amplitude);
    }
    samples
}

/// An immutable mono click buffer at the engine sample rate.
#[derive(Debug, Clone)]
pub struct ClickSample {
    samples: Vec<f32>,
}

impl ClickSample {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Build a mono sample from interleaved multi-channel data by averaging
    /// the channels of each frame.
    ///
    /// # Errors
    /// Returns `InitError::ChannelMismatch` if `channels` is 0 or the data
    /// length is not a whole number of frames.
    pub fn from_interleaved(
        name: &str,
        samples: &[f32],
        channels: u16,
    ) -> Result<ClickSample, InitError> {
        if channels == 0 || samples.len() % channels as usize != 0 {
            return Err(InitError::ChannelMismatch {
                name: name.to_string(),
                channels,
            });
        }
        if channels == 1 {
            return Ok(ClickSample::new(samples.to_vec()));
        }

        let ch = channels as usize;
        let mono = samples
            .chunks_exact(ch)
            .map(|frame| frame.iter().sum::<f32>() / ch as f32)
            .collect();
        Ok(ClickSample::new(mono))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

/// Per-beat-state click buffers, indexed by [BeatState::slot].
///
/// Built on the control thread, then frozen behind an `Arc` for the render
/// thread. Silence never has a buffer.
pub struct SampleBank {
    slots: [Option<Arc<ClickSample>>; BeatState::COUNT],
}

impl SampleBank {
    /// A bank with every slot empty (all states render silence).
    pub fn empty() -> Self {
        Self {
            slots: [None, None, None, None],
        }
    }

    /// A bank of synthesized clicks, no assets required.
    ///
    /// Accent is the brightest and loudest, medium sits between accent and
    /// normal. Deterministic for a given sample rate.
    pub fn synthesized(sample_rate: u32) -> Self {
        let mut bank = Self::empty();
        bank.set(
            BeatState::Normal,
            ClickSample::new(sine_click(sample_rate, 760.0, 12.0, 0.5)),
        );
        bank.set(
            BeatState::Medium,
            ClickSample::new(sine_click(sample_rate, 880.0, 12.0, 0.65)),
        );
        bank.set(
            BeatState::Accent,
            ClickSample::new(sine_click(sample_rate, 1000.0, 15.0, 0.85)),
        );
        bank
    }

    /// Build a bank from a click provider, degrading unusable slots.
    ///
    /// A state whose click is missing, unreadable, or at the wrong sample
    /// rate gets an empty slot and a logged warning; construction never
    /// fails. The mismatch rule is strict because the engine does not
    /// resample.
    pub fn from_provider(provider: &dyn ClickSampleProvider, engine_rate: u32) -> Self {
        let mut bank = Self::empty();

        for state in BeatState::ALL {
            if state == BeatState::Silence {
                continue;
            }
            let decoded = match provider.load(state) {
                None => {
                    log::warn!(
                        "[SampleBank] No click asset for {:?}; rendering silence",
                        state
                    );
                    continue;
                }
                Some(Err(err)) => {
                    log::warn!(
                        "[SampleBank] {:?} click unusable: {}; rendering silence",
                        state,
                        err.message()
                    );
                    continue;
                }
                Some(Ok(decoded)) => decoded,
            };

            if decoded.sample_rate != engine_rate {
                let err = InitError::SampleRateMismatch {
                    name: format!("{:?}", state),
                    expected: engine_rate,
                    actual: decoded.sample_rate,
                };
                log::warn!(
                    "[SampleBank] {}; rendering silence",
                    err.message()
                );
                continue;
            }

            match ClickSample::from_interleaved(
                &format!("{:?}", state),
                &decoded.samples,
                decoded.channels,
            ) {
                Ok(sample) => bank.set(state, sample),
                Err(err) => {
                    log::warn!(
                        "[SampleBank] {}; rendering silence",
                        err.message()
                    );
                }
            }
        }

        bank
    }

    /// Install a click for a state. Silence cannot carry a buffer and is
    /// ignored with a warning.
    pub fn set(&mut self, state: BeatState, sample: ClickSample) {
        if state == BeatState::Silence {
            log::warn!("[SampleBank] Ignoring click for Silence; silence has no buffer");
            return;
        }
        self.slots[state.slot()] = Some(Arc::new(sample));
    }

    #[inline]
    pub fn get(&self, state: BeatState) -> Option<&Arc<ClickSample>> {
        self.slots[state.slot()].as_ref()
    }

    /// Slot access by index for the render path.
    #[inline]
    pub fn get_slot(&self, slot: usize) -> Option<&ClickSample> {
        self.slots[slot].as_deref()
    }

    /// Number of states with a usable buffer.
    pub fn loaded_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::DecodedClick;

    struct FakeProvider {
        rate: u32,
        channels: u16,
        fail_accent: bool,
    }

    impl ClickSampleProvider for FakeProvider {
        fn load(&self, state: BeatState) -> Option<Result<DecodedClick, InitError>> {
            match state {
                BeatState::Silence => None,
                BeatState::Accent if self.fail_accent => Some(Err(InitError::AssetUnreadable {
                    name: "accent.wav".to_string(),
                    reason: "truncated".to_string(),
                })),
                _ => Some(Ok(DecodedClick {
                    samples: vec![0.25; 32 * self.channels as usize],
                    sample_rate: self.rate,
                    channels: self.channels,
                })),
            }
        }
    }

    #[test]
    fn test_noise_click_is_deterministic() {
        let a = noise_click(48_000);
        let b = noise_click(48_000);
        assert_eq!(a, b, "Fixed seed must produce identical output");
        assert_eq!(a.len(), (48_000.0 * NOISE_CLICK_MS / 1000.0) as usize);
    }

    #[test]
    fn test_sine_click_length_and_range() {
        let click = sine_click(48_000, 1000.0, 15.0, 0.85);
        assert_eq!(click.len(), 720, "15ms at 48kHz is 720 frames");

        for (i, &sample) in click.iter().enumerate() {
            assert!(
                sample.abs() <= 0.85,
                "Sample {} at index {} exceeds amplitude",
                sample,
                i
            );
        }
    }

    #[test]
    fn test_sine_click_decays() {
        let click = sine_click(48_000, 1000.0, 15.0, 0.85);
        let head_peak = click[..100].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let tail_peak = click[620..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(
            tail_peak < head_peak * 0.25,
            "Envelope should decay: head {} vs tail {}",
            head_peak,
            tail_peak
        );
    }

    #[test]
    fn test_from_interleaved_mixes_stereo_down() {
        let stereo = [1.0, 0.0, 0.5, 0.5, -1.0, 1.0];
        let mono = ClickSample::from_interleaved("test", &stereo, 2).unwrap();
        assert_eq!(mono.samples(), &[0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_from_interleaved_passes_mono_through() {
        let samples = [0.1, 0.2, 0.3];
        let mono = ClickSample::from_interleaved("test", &samples, 1).unwrap();
        assert_eq!(mono.samples(), &samples);
    }

    #[test]
    fn test_from_interleaved_rejects_misaligned_data() {
        let result = ClickSample::from_interleaved("test", &[0.0, 0.0, 0.0], 2);
        assert!(matches!(
            result,
            Err(InitError::ChannelMismatch { channels: 2, .. })
        ));

        let result = ClickSample::from_interleaved("test", &[0.0], 0);
        assert!(matches!(
            result,
            Err(InitError::ChannelMismatch { channels: 0, .. })
        ));
    }

    #[test]
    fn test_synthesized_bank_slots() {
        let bank = SampleBank::synthesized(48_000);
        assert!(bank.get(BeatState::Normal).is_some());
        assert!(bank.get(BeatState::Medium).is_some());
        assert!(bank.get(BeatState::Accent).is_some());
        assert!(
            bank.get(BeatState::Silence).is_none(),
            "Silence never has a buffer"
        );
        assert_eq!(bank.loaded_count(), 3);
    }

    #[test]
    fn test_synthesized_accent_is_loudest() {
        let bank = SampleBank::synthesized(48_000);
        let peak = |state: BeatState| {
            bank.get(state)
                .unwrap()
                .samples()
                .iter()
                .fold(0.0f32, |m, s| m.max(s.abs()))
        };
        assert!(peak(BeatState::Accent) > peak(BeatState::Medium));
        assert!(peak(BeatState::Medium) > peak(BeatState::Normal));
    }

    #[test]
    fn test_from_provider_builds_full_bank() {
        let provider = FakeProvider {
            rate: 48_000,
            channels: 2,
            fail_accent: false,
        };
        let bank = SampleBank::from_provider(&provider, 48_000);
        assert_eq!(bank.loaded_count(), 3);
        // Stereo sources are mixed down to mono frame counts
        assert_eq!(bank.get(BeatState::Normal).unwrap().len(), 32);
    }

    #[test]
    fn test_from_provider_degrades_unreadable_slot() {
        let provider = FakeProvider {
            rate: 48_000,
            channels: 1,
            fail_accent: true,
        };
        let bank = SampleBank::from_provider(&provider, 48_000);
        assert!(bank.get(BeatState::Accent).is_none(), "bad asset degrades");
        assert!(bank.get(BeatState::Normal).is_some(), "others still load");
        assert_eq!(bank.loaded_count(), 2);
    }

    #[test]
    fn test_from_provider_rejects_rate_mismatch() {
        let provider = FakeProvider {
            rate: 44_100,
            channels: 1,
            fail_accent: false,
        };
        let bank = SampleBank::from_provider(&provider, 48_000);
        assert_eq!(
            bank.loaded_count(),
            0,
            "No resampling: mismatched rates degrade to silence"
        );
    }

    #[test]
    fn test_set_ignores_silence() {
        let mut bank = SampleBank::empty();
        bank.set(BeatState::Silence, ClickSample::new(vec![1.0]));
        assert!(bank.get(BeatState::Silence).is_none());
    }
}
