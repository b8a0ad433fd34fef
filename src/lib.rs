// Metronome Plus Core - Rust Audio Engine
// Sample-accurate click scheduling with a lock-free render path

// Module declarations
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod managers;
pub mod model;
pub mod providers;

#[cfg(target_os = "android")]
pub mod android;

// Re-exports for convenience
pub use config::EngineConfig;
pub use engine::MetronomeEngine;
pub use model::{BeatEvent, BeatState, EngineEvent, EngineEventKind, Pattern, PlaybackState};

#[cfg(target_os = "android")]
use log::info;

/// Initialize Android logging
#[cfg(target_os = "android")]
pub fn init_logging() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("MetronomePlus"),
    );
}

#[cfg(not(target_os = "android"))]
pub fn init_logging() {
    // try_init so hosts and tests that already installed a logger are fine
    let _ = env_logger::try_init();
}

/// JNI_OnLoad is called when the native library is loaded by Android
/// This function initializes the Android context required by oboe-rs
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(
    vm: jni::JavaVM,
    _reserved: *mut std::ffi::c_void,
) -> jni::sys::jint {
    init_logging();

    info!("JNI_OnLoad called - initializing Android context");

    // Initialize ndk-context so oboe can reach the Android audio subsystem.
    // SAFETY: the VM pointer stays valid for the process lifetime; oboe only
    // needs the VM half of the context, the activity context stays null.
    unsafe {
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer() as *mut std::ffi::c_void,
            std::ptr::null_mut(),
        );
    }

    info!("Android context initialized successfully");

    jni::sys::JNI_VERSION_1_6
}
