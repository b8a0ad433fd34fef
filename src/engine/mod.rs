//! Engine module housing the reusable audio core.
//!
//! This module exposes trait-based backends (`backend`) and the
//! `MetronomeEngine` orchestration layer (`core`).

pub mod backend;
pub mod core;

#[cfg(target_os = "android")]
pub use backend::OboeBackend;
#[cfg(not(target_os = "android"))]
pub use backend::CpalBackend;
pub use backend::{AudioBackend, OfflineBackend, StreamContext};
pub use core::MetronomeEngine;
