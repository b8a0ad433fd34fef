// Managers Module
//
// Focused manager classes, each handling one specific concern:
// - StreamManager: output stream lifecycle state machine and playback flags

pub mod stream_manager;

pub use stream_manager::{StreamManager, StreamResources, StreamState};
