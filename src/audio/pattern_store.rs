//! Pattern store - shared tempo and pattern configuration
//!
//! The store is the single cell both planes agree on:
//! - Control plane: validates and publishes new snapshots (tempo and/or
//!   pattern), serialized by a mutex so concurrent publishers cannot
//!   interleave their read-modify-write
//! - Render plane: reads the current snapshot with one atomic pointer load
//!   per callback; it always observes a whole snapshot, never a torn mix
//!
//! Old snapshots are reclaimed by reference counting. The render thread may
//! perform the final drop of a superseded snapshot; snapshots are a few
//! dozen bytes, so that rare dealloc is bounded and acceptable.

use arc_swap::{ArcSwap, Guard};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::ConfigError;
use crate::model::{Pattern, DEFAULT_BPM};

/// An immutable (tempo, pattern) configuration with its publish generation.
///
/// The generation is strictly increasing across publishes; beat events carry
/// the generation of the snapshot that produced them so consumers can drop
/// events that predate a reconfiguration.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub bpm: u32,
    pub pattern: Pattern,
    pub generation: u64,
}

/// The shared configuration cell.
pub struct PatternStore {
    snapshot: ArcSwap<Snapshot>,
    generation: AtomicU64,
    // Serializes publishers; holds no data, so a poisoned gate is recovered
    // rather than propagated.
    publish_gate: Mutex<()>,
}

impl PatternStore {
    /// A store holding the app's initial measure (120 BPM, accent + three
    /// normal beats) at generation 0.
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot {
                bpm: DEFAULT_BPM,
                pattern: Pattern::default(),
                generation: 0,
            }),
            generation: AtomicU64::new(0),
            publish_gate: Mutex::new(()),
        }
    }

    /// A store with a caller-chosen initial configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidTempo` if `bpm` is 0.
    pub fn with_initial(bpm: u32, pattern: Pattern) -> Result<Self, ConfigError> {
        if bpm == 0 {
            return Err(ConfigError::InvalidTempo { bpm });
        }
        Ok(Self {
            snapshot: ArcSwap::from_pointee(Snapshot {
                bpm,
                pattern,
                generation: 0,
            }),
            generation: AtomicU64::new(0),
            publish_gate: Mutex::new(()),
        })
    }

    /// Publish a new tempo, keeping the current pattern.
    ///
    /// # Returns
    /// The generation of the new snapshot.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidTempo` if `bpm` is 0; the previous
    /// snapshot stays active.
    pub fn set_tempo(&self, bpm: u32) -> Result<u64, ConfigError> {
        if bpm == 0 {
            return Err(ConfigError::InvalidTempo { bpm });
        }
        let _gate = self.lock_gate();
        let pattern = self.snapshot.load().pattern.clone();
        Ok(self.swap_in(bpm, pattern))
    }

    /// Publish a new pattern, keeping the current tempo.
    ///
    /// Patterns are validated at construction, so this cannot fail.
    ///
    /// # Returns
    /// The generation of the new snapshot.
    pub fn set_pattern(&self, pattern: Pattern) -> u64 {
        let _gate = self.lock_gate();
        let bpm = self.snapshot.load().bpm;
        self.swap_in(bpm, pattern)
    }

    /// Publish tempo and pattern together as one snapshot.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidTempo` if `bpm` is 0.
    pub fn publish(&self, bpm: u32, pattern: Pattern) -> Result<u64, ConfigError> {
        if bpm == 0 {
            return Err(ConfigError::InvalidTempo { bpm });
        }
        let _gate = self.lock_gate();
        Ok(self.swap_in(bpm, pattern))
    }

    /// Current snapshot for the render thread.
    ///
    /// One atomic load, no reference counting on the fast path. The guard
    /// must not be held across callbacks; clone the `Arc` to retain it.
    #[inline]
    pub fn load(&self) -> Guard<Arc<Snapshot>> {
        self.snapshot.load()
    }

    /// Current snapshot as an owned handle (control-plane introspection).
    pub fn load_full(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    /// Generation of the most recently published snapshot.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn lock_gate(&self) -> std::sync::MutexGuard<'_, ()> {
        self.publish_gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // Callers hold the publish gate, so the read-increment-store is not
    // racing other publishers. The counter is stored after the snapshot so
    // `generation()` never reports a generation that is not yet readable.
    fn swap_in(&self, bpm: u32, pattern: Pattern) -> u64 {
        let generation = self.generation.load(Ordering::Relaxed) + 1;
        self.snapshot.store(Arc::new(Snapshot {
            bpm,
            pattern,
            generation,
        }));
        self.generation.store(generation, Ordering::Release);
        generation
    }
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BeatState;

    #[test]
    fn test_new_store_holds_default_measure() {
        let store = PatternStore::new();
        let snapshot = store.load_full();
        assert_eq!(snapshot.bpm, 120);
        assert_eq!(snapshot.pattern, Pattern::default());
        assert_eq!(snapshot.generation, 0);
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_set_tempo_bumps_generation_and_keeps_pattern() {
        let store = PatternStore::new();
        let generation = store.set_tempo(90).unwrap();
        assert_eq!(generation, 1);

        let snapshot = store.load_full();
        assert_eq!(snapshot.bpm, 90);
        assert_eq!(snapshot.generation, 1);
        assert_eq!(
            snapshot.pattern,
            Pattern::default(),
            "Tempo change must not touch the pattern"
        );
    }

    #[test]
    fn test_set_pattern_keeps_tempo() {
        let store = PatternStore::new();
        store.set_tempo(200).unwrap();

        let pattern = Pattern::new(vec![BeatState::Accent, BeatState::Silence]).unwrap();
        let generation = store.set_pattern(pattern.clone());
        assert_eq!(generation, 2);

        let snapshot = store.load_full();
        assert_eq!(snapshot.bpm, 200, "Pattern change must not touch the tempo");
        assert_eq!(snapshot.pattern, pattern);
    }

    #[test]
    fn test_invalid_tempo_leaves_snapshot_untouched() {
        let store = PatternStore::new();
        store.set_tempo(140).unwrap();

        let result = store.set_tempo(0);
        assert_eq!(result, Err(ConfigError::InvalidTempo { bpm: 0 }));

        let snapshot = store.load_full();
        assert_eq!(snapshot.bpm, 140, "Rejected publish must change nothing");
        assert_eq!(snapshot.generation, 1);
        assert_eq!(store.generation(), 1);
    }

    #[test]
    fn test_publish_replaces_both_halves() {
        let store = PatternStore::new();
        let pattern = Pattern::new(vec![BeatState::Medium]).unwrap();
        let generation = store.publish(60, pattern.clone()).unwrap();

        let snapshot = store.load_full();
        assert_eq!(generation, 1);
        assert_eq!(snapshot.bpm, 60);
        assert_eq!(snapshot.pattern, pattern);
    }

    #[test]
    fn test_with_initial_validates_tempo() {
        assert!(PatternStore::with_initial(0, Pattern::default()).is_err());
        let store = PatternStore::with_initial(72, Pattern::default()).unwrap();
        assert_eq!(store.load_full().bpm, 72);
    }

    #[test]
    fn test_generations_are_strictly_increasing() {
        let store = PatternStore::new();
        let mut last = 0;
        for bpm in [100, 110, 120, 130] {
            let generation = store.set_tempo(bpm).unwrap();
            assert!(generation > last, "Generations must strictly increase");
            last = generation;
        }
        let generation = store.set_pattern(Pattern::default());
        assert!(generation > last);
    }

    #[test]
    fn test_concurrent_publishers_serialize() {
        let store = Arc::new(PatternStore::new());
        let publishes_per_thread = 100;

        let handles: Vec<_> = (0..2)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..publishes_per_thread {
                        store.set_tempo(60 + t * 100 + i).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.generation(),
            2 * publishes_per_thread as u64,
            "Every publish must get its own generation"
        );
        let snapshot = store.load_full();
        assert_eq!(snapshot.generation, store.generation());
    }
}
