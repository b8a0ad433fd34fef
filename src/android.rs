//! Android FFI surface
//!
//! JNI exports for the host application's `MetronomeEngineImpl` /
//! `NativeMetronomeEngine` bindings. The export names keep the original
//! app's package path, so the Kotlin side loads this library unchanged.
//!
//! Call contract (control thread only):
//! 1. `native_setDefaultStreamValues(sampleRate, framesPerBurst)` with the
//!    platform audio settings
//! 2. optionally `native_loadSample(ordinal, pcm, sampleRate, channels)` per
//!    beat state with platform-decoded PCM; un-staged states fall back to
//!    the synthesized clicks
//! 3. `native_onInit()` builds the engine and opens the stream
//! 4. `native_SetBPM` / `native_SetBeats` / `native_onStartPlaying` /
//!    `native_onStopPlaying` at will; `native_onEnd()` tears down
//!
//! The beat listener is decoupled from the render thread: a forwarder
//! thread drains the beat bridge and invokes `onBeat(int)` on an attached
//! JVM thread, so the callback can never block the audio path.

use std::sync::Mutex;

use jni::objects::{GlobalRef, JClass, JFloatArray, JIntArray, JObject, JValue};
use jni::sys::jint;
use jni::JNIEnv;
use log::{error, info, warn};
use once_cell::sync::Lazy;

use crate::audio::sample_bank::{ClickSample, SampleBank};
use crate::config::EngineConfig;
use crate::engine::MetronomeEngine;
use crate::error::{log_config_error, log_init_error, log_stream_error, ErrorCode};
use crate::model::{BeatState, Pattern};

/// Geometry and samples staged before `native_onInit` builds the engine.
struct Staged {
    config: EngineConfig,
    clicks: Vec<(BeatState, ClickSample)>,
}

static STAGED: Lazy<Mutex<Staged>> = Lazy::new(|| {
    Mutex::new(Staged {
        config: EngineConfig::default(),
        clicks: Vec::new(),
    })
});

static ENGINE: Lazy<Mutex<Option<MetronomeEngine>>> = Lazy::new(|| Mutex::new(None));

fn with_engine(context: &str, f: impl FnOnce(&MetronomeEngine)) {
    match ENGINE.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(engine) => f(engine),
            None => warn!("[JNI] {} called before native_onInit", context),
        },
        Err(_) => error!("[JNI] {}: engine lock poisoned", context),
    }
}

/// Stage the platform's preferred stream geometry for the next
/// `native_onInit`. Out-of-range values are ignored.
#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_MetronomeEngineImpl_native_1setDefaultStreamValues(
    _env: JNIEnv,
    _this: JObject,
    sample_rate: jint,
    frames_per_burst: jint,
) {
    if sample_rate <= 0 || frames_per_burst <= 0 {
        warn!(
            "[JNI] Ignoring invalid stream values {} Hz / {} frames",
            sample_rate, frames_per_burst
        );
        return;
    }
    if let Ok(mut staged) = STAGED.lock() {
        staged.config.sample_rate = sample_rate as u32;
        staged.config.frames_per_burst = frames_per_burst as u32;
        info!(
            "[JNI] Stream values staged: {} Hz, {} frames/burst",
            sample_rate, frames_per_burst
        );
    }
}

/// Install platform-decoded PCM for one beat state ordinal. Must precede
/// `native_onInit`; later calls are ignored with a warning because the
/// sample bank is immutable once the render thread can see it.
#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_MetronomeEngineImpl_native_1loadSample(
    env: JNIEnv,
    _this: JObject,
    ordinal: jint,
    pcm: JFloatArray,
    sample_rate: jint,
    channels: jint,
) {
    let state = match BeatState::from_ordinal(ordinal) {
        Ok(state) => state,
        Err(err) => {
            log_config_error(&err, "native_loadSample");
            return;
        }
    };

    let len = match env.get_array_length(&pcm) {
        Ok(len) => len as usize,
        Err(err) => {
            error!("[JNI] native_loadSample: cannot read array length: {}", err);
            return;
        }
    };
    let mut samples = vec![0.0f32; len];
    if let Err(err) = env.get_float_array_region(&pcm, 0, &mut samples) {
        error!("[JNI] native_loadSample: cannot copy PCM: {}", err);
        return;
    }

    // ENGINE before STAGED, same order as native_onInit.
    if let Ok(engine_guard) = ENGINE.lock() {
        if engine_guard.is_some() {
            warn!("[JNI] native_loadSample after native_onInit is ignored");
            return;
        }
    }
    let mut staged = match STAGED.lock() {
        Ok(staged) => staged,
        Err(_) => return,
    };
    if sample_rate as u32 != staged.config.sample_rate {
        warn!(
            "[JNI] {:?} sample is {} Hz but the stream runs at {} Hz; ignored",
            state, sample_rate, staged.config.sample_rate
        );
        return;
    }

    match ClickSample::from_interleaved(&format!("{:?}", state), &samples, channels as u16) {
        Ok(sample) => {
            info!("[JNI] Staged {:?} click ({} frames)", state, sample.len());
            staged.clicks.push((state, sample));
        }
        Err(err) => log_init_error(&err, "native_loadSample"),
    }
}

/// Build the engine from the staged geometry and samples and open the
/// output stream. States without a staged sample use the synthesized
/// clicks, so the metronome is audible even with no assets loaded.
#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_MetronomeEngineImpl_native_1onInit(
    _env: JNIEnv,
    _this: JObject,
) -> jint {
    let mut engine_guard = match ENGINE.lock() {
        Ok(guard) => guard,
        Err(_) => return -1,
    };
    if engine_guard.is_some() {
        warn!("[JNI] native_onInit called twice; keeping the existing engine");
        return 0;
    }

    let (config, clicks) = match STAGED.lock() {
        Ok(mut staged) => (staged.config, std::mem::take(&mut staged.clicks)),
        Err(_) => (EngineConfig::default(), Vec::new()),
    };

    let mut bank = SampleBank::synthesized(config.sample_rate);
    for (state, sample) in clicks {
        bank.set(state, sample);
    }

    match MetronomeEngine::initialize(config, bank) {
        Ok(engine) => {
            *engine_guard = Some(engine);
            0
        }
        Err(err) => {
            log_init_error(&err, "native_onInit");
            err.code()
        }
    }
}

#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_MetronomeEngineImpl_native_1onEnd(
    _env: JNIEnv,
    _this: JObject,
) {
    match ENGINE.lock() {
        Ok(mut guard) => {
            if let Some(engine) = guard.take() {
                engine.shutdown();
            }
        }
        Err(_) => error!("[JNI] native_onEnd: engine lock poisoned"),
    }
}

#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_MetronomeEngineImpl_native_1SetBPM(
    _env: JNIEnv,
    _this: JObject,
    bpm: jint,
) {
    with_engine("native_SetBPM", |engine| {
        if bpm <= 0 {
            // Map the jint domain onto the u32 validation path.
            let _ = engine.set_tempo(0);
            return;
        }
        let _ = engine.set_tempo(bpm as u32);
    });
}

/// Replace the measure. `beats` carries BeatState ordinals, one per beat.
#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_MetronomeEngineImpl_native_1SetBeats(
    env: JNIEnv,
    _this: JObject,
    beats: JIntArray,
) {
    let len = match env.get_array_length(&beats) {
        Ok(len) => len as usize,
        Err(err) => {
            error!("[JNI] native_SetBeats: cannot read array length: {}", err);
            return;
        }
    };
    let mut ordinals = vec![0i32; len];
    if let Err(err) = env.get_int_array_region(&beats, 0, &mut ordinals) {
        error!("[JNI] native_SetBeats: cannot copy ordinals: {}", err);
        return;
    }

    let pattern = match Pattern::from_ordinals(&ordinals) {
        Ok(pattern) => pattern,
        Err(err) => {
            log_config_error(&err, "native_SetBeats");
            return;
        }
    };

    with_engine("native_SetBeats", |engine| {
        let _ = engine.set_pattern(pattern.steps());
    });
}

#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_MetronomeEngineImpl_native_1onStartPlaying(
    _env: JNIEnv,
    _this: JObject,
) {
    with_engine("native_onStartPlaying", |engine| {
        if let Err(err) = engine.play() {
            log_stream_error(&err, "native_onStartPlaying");
        }
    });
}

#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_MetronomeEngineImpl_native_1onStopPlaying(
    _env: JNIEnv,
    _this: JObject,
) {
    with_engine("native_onStopPlaying", |engine| {
        if let Err(err) = engine.pause() {
            log_stream_error(&err, "native_onStopPlaying");
        }
    });
}

/// Register the beat listener and start the forwarder thread.
///
/// The forwarder owns a global ref to the listener, attaches itself to the
/// JVM, and invokes `onBeat(int)` per delivered beat. It exits when the
/// engine (and with it the beat bridge) shuts down. Replacing the listener
/// simply starts a new forwarder; the old one dies with its bridge when the
/// engine is torn down.
#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_data_engine_NativeMetronomeEngine_native_1setListener(
    env: JNIEnv,
    _this: JObject,
    listener: JObject,
) {
    let vm = match env.get_java_vm() {
        Ok(vm) => vm,
        Err(err) => {
            error!("[JNI] native_setListener: cannot get JavaVM: {}", err);
            return;
        }
    };
    let listener: GlobalRef = match env.new_global_ref(&listener) {
        Ok(global) => global,
        Err(err) => {
            error!("[JNI] native_setListener: cannot pin listener: {}", err);
            return;
        }
    };

    let mut beats = match ENGINE.lock() {
        Ok(guard) => match guard.as_ref() {
            Some(engine) => engine.beats_unbounded(),
            None => {
                warn!("[JNI] native_setListener called before native_onInit");
                return;
            }
        },
        Err(_) => return,
    };

    std::thread::Builder::new()
        .name("beat-listener".to_string())
        .spawn(move || {
            let mut attached = match vm.attach_current_thread() {
                Ok(env) => env,
                Err(err) => {
                    error!("[JNI] Beat forwarder cannot attach to the JVM: {}", err);
                    return;
                }
            };
            info!("[JNI] Beat forwarder started");
            while let Some(event) = beats.blocking_recv() {
                let result = attached.call_method(
                    listener.as_obj(),
                    "onBeat",
                    "(I)V",
                    &[JValue::Int(event.beat_index as jint)],
                );
                if let Err(err) = result {
                    error!("[JNI] onBeat callback failed: {}", err);
                    if attached.exception_check().unwrap_or(false) {
                        let _ = attached.exception_clear();
                    }
                }
            }
            info!("[JNI] Beat forwarder exited");
        })
        .map_err(|err| error!("[JNI] Cannot spawn beat forwarder: {}", err))
        .ok();
}

// Keeps the original helloC smoke export alive for the host's loader test.
#[no_mangle]
pub extern "system" fn Java_br_com_jonatas_metronomeplus_presenter_ui_MainActivity_helloC<'local>(
    mut env: JNIEnv<'local>,
    _this: JClass<'local>,
) -> jni::sys::jstring {
    match env.new_string("metronome_plus native library loaded") {
        Ok(s) => s.into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}
