//! Beat clock - frame-domain timing arithmetic
//!
//! This module provides the pure math behind sample-accurate beat scheduling.
//! Key properties:
//! - Beat onsets are derived from counted output frames, never wall-clock time
//! - Sample-accurate (0 jitter): a boundary is exactly one frame
//! - Pure functions, zero allocations, safe to call from the render thread

/// Converts BPM (beats per minute) to samples per beat.
///
/// Formula: samples_per_beat = (sample_rate × 60) / BPM, floored to whole
/// frames. `bpm` must be greater than 0; the control API rejects 0 before it
/// can reach this function.
///
/// # Arguments
/// * `bpm` - Beats per minute
/// * `sample_rate` - Sample rate in Hz (typically 48000)
///
/// # Returns
/// Number of frames between consecutive beat onsets
///
/// # Examples
/// ```
/// use metronome_plus::audio::beat_clock::samples_per_beat;
///
/// assert_eq!(samples_per_beat(120, 48000), 24000);
/// assert_eq!(samples_per_beat(60, 48000), 48000);
/// ```
#[inline]
pub fn samples_per_beat(bpm: u32, sample_rate: u32) -> u64 {
    (sample_rate as u64 * 60) / bpm as u64
}

/// Splits an elapsed frame count into (beats completed, frames into beat).
///
/// # Arguments
/// * `elapsed_frames` - Frames rendered since the current timing epoch
/// * `samples_per_beat` - Frames per beat at the active tempo (must be > 0)
///
/// # Returns
/// `(beat_number, phase)` where `phase == 0` means `elapsed_frames` sits
/// exactly on a beat onset
///
/// # Examples
/// ```
/// use metronome_plus::audio::beat_clock::beat_position;
///
/// assert_eq!(beat_position(0, 48000), (0, 0));
/// assert_eq!(beat_position(48000, 48000), (1, 0));
/// assert_eq!(beat_position(50000, 48000), (1, 2000));
/// ```
#[inline]
pub fn beat_position(elapsed_frames: u64, samples_per_beat: u64) -> (u64, u64) {
    (
        elapsed_frames / samples_per_beat,
        elapsed_frames % samples_per_beat,
    )
}

/// Maps an absolute beat number onto a pattern slot.
///
/// # Arguments
/// * `beat_number` - Beats completed since playback started
/// * `pattern_len` - Number of beats in the pattern (must be >= 1)
///
/// # Returns
/// Index into the pattern, cycling 0, 1, ..., len-1, 0, ...
#[inline]
pub fn beat_index(beat_number: u64, pattern_len: usize) -> usize {
    (beat_number % pattern_len as u64) as usize
}

/// Checks if an elapsed frame count is exactly on a beat boundary.
///
/// # Examples
/// ```
/// use metronome_plus::audio::beat_clock::is_beat_boundary;
///
/// assert!(is_beat_boundary(0, 24000));
/// assert!(is_beat_boundary(24000, 24000));
/// assert!(!is_beat_boundary(24001, 24000));
/// ```
#[inline]
pub fn is_beat_boundary(elapsed_frames: u64, samples_per_beat: u64) -> bool {
    elapsed_frames % samples_per_beat == 0
}

/// Composes [beat_position] and [beat_index] for a fixed-tempo playhead.
///
/// # Returns
/// `(pattern_index, phase)` for the frame at `elapsed_frames`
#[inline]
pub fn beat_index_at(
    elapsed_frames: u64,
    samples_per_beat: u64,
    pattern_len: usize,
) -> (usize, u64) {
    let (beat_number, phase) = beat_position(elapsed_frames, samples_per_beat);
    (beat_index(beat_number, pattern_len), phase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_per_beat_formula() {
        // Verify formula: samples_per_beat = (sample_rate × 60) / BPM

        // At 120 BPM, 48kHz: (48000 * 60) / 120 = 24000
        assert_eq!(samples_per_beat(120, 48000), 24000);

        // At 60 BPM, 48kHz: (48000 * 60) / 60 = 48000
        assert_eq!(samples_per_beat(60, 48000), 48000);

        // At 600 BPM, 48kHz: (48000 * 60) / 600 = 4800
        assert_eq!(samples_per_beat(600, 48000), 4800);

        // At 100 BPM, 44.1kHz: (44100 * 60) / 100 = 26460
        assert_eq!(samples_per_beat(100, 44100), 26460);
    }

    #[test]
    fn test_samples_per_beat_floors_inexact_tempos() {
        // 140 BPM at 48kHz is 20571.43 frames; integer math floors
        assert_eq!(samples_per_beat(140, 48000), 20571);
    }

    #[test]
    fn test_beat_position_boundaries_at_60_bpm() {
        let spb = samples_per_beat(60, 48000); // 48000

        // Beat onsets land exactly at multiples of one second of frames
        for (frame, beat) in [(0, 0), (48000, 1), (96000, 2), (144000, 3), (192000, 4)] {
            let (beats, phase) = beat_position(frame, spb);
            assert_eq!(beats, beat, "Frame {} should be beat {}", frame, beat);
            assert_eq!(phase, 0, "Frame {} should be exactly on the onset", frame);
        }
    }

    #[test]
    fn test_beat_position_phase_between_beats() {
        let spb = samples_per_beat(60, 48000);

        let (beats, phase) = beat_position(1, spb);
        assert_eq!((beats, phase), (0, 1), "Frame 1 is one frame into beat 0");

        let (beats, phase) = beat_position(47999, spb);
        assert_eq!((beats, phase), (0, 47999), "Last frame of beat 0");

        let (beats, phase) = beat_position(48001, spb);
        assert_eq!((beats, phase), (1, 1), "One frame past the second onset");
    }

    #[test]
    fn test_beat_index_cycles_through_pattern() {
        // Four-beat pattern: indices advance 0, 1, 2, 3, 0, 1, ...
        let expected = [0, 1, 2, 3, 0, 1, 2, 3, 0];
        for (beat_number, &index) in expected.iter().enumerate() {
            assert_eq!(
                beat_index(beat_number as u64, 4),
                index,
                "Beat {} should map to pattern slot {}",
                beat_number,
                index
            );
        }
    }

    #[test]
    fn test_beat_index_single_beat_pattern() {
        // A one-beat pattern hits slot 0 every single beat
        for beat_number in 0..10 {
            assert_eq!(beat_index(beat_number, 1), 0);
        }
    }

    #[test]
    fn test_is_beat_boundary_zero_sample_error() {
        // Only exact multiples count as boundaries
        let spb = samples_per_beat(120, 48000); // 24000

        assert!(is_beat_boundary(0, spb), "Frame 0 is the first onset");
        assert!(is_beat_boundary(spb, spb));
        assert!(is_beat_boundary(spb * 7, spb));

        for offset in 1..100 {
            assert!(
                !is_beat_boundary(spb + offset, spb),
                "Frame {} is not exactly on a beat",
                spb + offset
            );
            assert!(
                !is_beat_boundary(spb - offset, spb),
                "Frame {} is not exactly on a beat",
                spb - offset
            );
        }
    }

    #[test]
    fn test_beat_index_at_spec_timeline() {
        // 48kHz, 60 BPM, 4-beat pattern: onsets every 48000 frames walking
        // slots 0, 1, 2, 3 and wrapping back to 0
        let spb = samples_per_beat(60, 48000);

        let cases = [
            (0u64, 0usize),
            (48000, 1),
            (96000, 2),
            (144000, 3),
            (192000, 0),
        ];
        for (frame, slot) in cases {
            let (index, phase) = beat_index_at(frame, spb, 4);
            assert_eq!(index, slot, "Frame {} should trigger slot {}", frame, slot);
            assert_eq!(phase, 0);
        }
    }

    #[test]
    fn test_sustained_600_bpm_spacing() {
        // 600 BPM at 48kHz: a beat every 4800 frames, no drift over many beats
        let spb = samples_per_beat(600, 48000);
        assert_eq!(spb, 4800);

        for beat in 0..1000u64 {
            let (beats, phase) = beat_position(beat * 4800, spb);
            assert_eq!(beats, beat);
            assert_eq!(phase, 0, "Beat {} should land exactly on its onset", beat);
        }
    }
}
