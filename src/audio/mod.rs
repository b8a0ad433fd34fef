// Audio module - beat timing, click samples, and the real-time renderer

pub mod beat_clock;
pub mod event_relay;
pub mod pattern_store;
pub mod render;
pub mod sample_bank;

#[cfg(target_os = "android")]
pub mod engine_oboe;

#[cfg(not(target_os = "android"))]
pub mod engine_cpal;

// Re-export commonly used types for convenience
pub use event_relay::{beat_event_channel, BeatEventReceiver, BeatEventSender};
pub use pattern_store::{PatternStore, Snapshot};
pub use render::Renderer;
pub use sample_bank::{ClickSample, SampleBank};
