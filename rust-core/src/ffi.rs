//! C FFI Bindings for the mobile host.
//!
//! This module exposes the step engine to Android/iOS via C ABI. The host
//! owns sensor registration and durable storage; it pushes samples in and
//! hands the engine a callback table for the persisted step total.
//!
//! Memory Safety:
//! - All returned strings must be freed with `stepx_free_string()`
//! - The engine instance must be freed with `stepx_engine_destroy()`
//! - NULL checks are performed on all inputs
//!
//! Thread Safety:
//! - The engine is NOT thread-safe. Push samples from a single thread or
//!   behind a mutex. Settings setters may be called from any thread.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::ptr;
use std::sync::Arc;

use tracing::warn;

use crate::error::StoreError;
use crate::pipeline::{EngineConfig, StepEngine};
use crate::step_detection::StepSource;
use crate::store::{SharedSettings, StepTotalStore};
use crate::types::{ActivityState, EngineOutputs, RawSample, StepEvent};

// ============================================================================
// HOST CALLBACKS
// ============================================================================

/// Reads the persisted step total.
pub type ReadTotalFn = unsafe extern "C" fn(user_data: *mut c_void) -> u32;

/// Adds `delta` to the persisted step total. Must return promptly.
pub type IncrementTotalFn = unsafe extern "C" fn(user_data: *mut c_void, delta: u32);

/// Durable step counter provided by the host.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StepxStoreCallbacks {
    /// Opaque pointer passed back to every callback.
    pub user_data: *mut c_void,
    /// Called once during `stepx_engine_create()`. NULL means "start at 0".
    pub read_total: Option<ReadTotalFn>,
    /// Called once per step event. NULL means increments are not persisted.
    pub increment_total: Option<IncrementTotalFn>,
}

struct CallbackStore {
    callbacks: StepxStoreCallbacks,
}

impl StepTotalStore for CallbackStore {
    fn read_total(&self) -> Result<u32, StoreError> {
        match self.callbacks.read_total {
            // SAFETY: the host guarantees the callback and user_data stay valid
            // for the engine's lifetime.
            Some(read) => Ok(unsafe { read(self.callbacks.user_data) }),
            None => Ok(0),
        }
    }

    fn increment_total(&self, delta: u32) -> Result<(), StoreError> {
        match self.callbacks.increment_total {
            Some(increment) => {
                // SAFETY: see read_total.
                unsafe { increment(self.callbacks.user_data, delta) };
                Ok(())
            }
            None => Ok(()),
        }
    }
}

// ============================================================================
// OPAQUE HANDLE TYPES
// ============================================================================

/// Opaque handle to the StepX engine.
pub struct StepxEngine {
    engine: StepEngine<CallbackStore, Arc<SharedSettings>>,
    settings: Arc<SharedSettings>,
}

/// Result status codes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepxStatus {
    /// Operation succeeded.
    Ok = 0,
    /// Null pointer provided.
    NullPointer = 1,
}

/// Configuration for the engine.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StepxConfig {
    /// Step source (0=HardwareCounter, 1=HardwarePulse, 2=Accelerometer).
    pub step_source: i32,
    /// Daily step goal (0 selects the default of 10000).
    pub daily_goal: u32,
    /// Durable step counter.
    pub store: StepxStoreCallbacks,
}

/// Snapshot of the observable engine state.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct StepxOutputs {
    pub total_steps: u32,
    pub speed_mps: f32,
    /// Activity (0=Stopped, 1=Walking, 2=Running).
    pub activity: i32,
    pub distance_m: f32,
    pub calories_kcal: f32,
    pub ambient_lux: f32,
    /// 1 if the proximity sensor reports an obstruction.
    pub is_covered: i32,
    /// Fraction of the daily goal reached [0.0, 1.0].
    pub goal_progress: f32,
}

fn source_from_code(code: i32) -> Option<StepSource> {
    match code {
        0 => Some(StepSource::HardwareCounter),
        1 => Some(StepSource::HardwarePulse),
        2 => Some(StepSource::Accelerometer),
        _ => None,
    }
}

fn activity_code(activity: ActivityState) -> i32 {
    match activity {
        ActivityState::Stopped => 0,
        ActivityState::Walking => 1,
        ActivityState::Running => 2,
    }
}

impl StepxOutputs {
    fn from_outputs(outputs: &EngineOutputs, daily_goal: u32) -> Self {
        Self {
            total_steps: outputs.total_steps,
            speed_mps: outputs.speed_mps,
            activity: activity_code(outputs.activity),
            distance_m: outputs.distance_m,
            calories_kcal: outputs.calories_kcal,
            ambient_lux: outputs.ambient_lux,
            is_covered: i32::from(outputs.is_covered),
            goal_progress: outputs.goal_progress(daily_goal),
        }
    }
}

// ============================================================================
// ENGINE LIFECYCLE
// ============================================================================

/// Create a new StepX engine instance.
///
/// The persisted total is read once through `config.store.read_total`.
/// Settings start unloaded (pocket detection off) until the host sets them.
///
/// # Safety
/// - `config` must be a valid pointer to StepxConfig.
/// - The callbacks and `user_data` must outlive the engine.
/// - The returned pointer must be freed with `stepx_engine_destroy()`.
///
/// # Returns
/// - Pointer to StepxEngine on success.
/// - NULL on failure.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_create(config: *const StepxConfig) -> *mut StepxEngine {
    if config.is_null() {
        return ptr::null_mut();
    }
    let config = &*config;

    let Some(step_source) = source_from_code(config.step_source) else {
        warn!(code = config.step_source, "unknown step source code");
        return ptr::null_mut();
    };

    let mut engine_config = EngineConfig::for_source(step_source);
    if config.daily_goal > 0 {
        engine_config.daily_goal = config.daily_goal;
    }

    let settings = Arc::new(SharedSettings::unloaded());
    let store = CallbackStore {
        callbacks: config.store,
    };

    match StepEngine::new(engine_config, store, Arc::clone(&settings)) {
        Ok(engine) => Box::into_raw(Box::new(StepxEngine { engine, settings })),
        Err(err) => {
            warn!(%err, "failed to create step engine");
            ptr::null_mut()
        }
    }
}

/// Destroy a StepX engine instance.
///
/// # Safety
/// - `engine` must be a valid pointer from `stepx_engine_create()`.
/// - Must not be called more than once for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_destroy(engine: *mut StepxEngine) {
    if !engine.is_null() {
        drop(Box::from_raw(engine));
    }
}

// ============================================================================
// SAMPLE PROCESSING
// ============================================================================

unsafe fn push(
    engine: *mut StepxEngine,
    sample: RawSample,
    step_delta_out: *mut u32,
) -> StepxStatus {
    if engine.is_null() {
        return StepxStatus::NullPointer;
    }
    // Borrow the engine field only; settings setters may run concurrently.
    let engine = &mut (*engine).engine;

    let delta = engine
        .process_sample(&sample)
        .map_or(0, |event: StepEvent| event.count_delta());

    if !step_delta_out.is_null() {
        *step_delta_out = delta;
    }
    StepxStatus::Ok
}

/// Push an ambient light reading.
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `step_delta_out` may be NULL; otherwise it receives the steps counted.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_push_light(
    engine: *mut StepxEngine,
    timestamp_ms: u64,
    lux: f32,
    step_delta_out: *mut u32,
) -> StepxStatus {
    push(engine, RawSample::light(timestamp_ms, lux), step_delta_out)
}

/// Push a proximity reading. Pass `has_distance = 0` when the platform
/// delivered no value; the device then counts as uncovered.
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `step_delta_out` may be NULL.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_push_proximity(
    engine: *mut StepxEngine,
    timestamp_ms: u64,
    has_distance: i32,
    distance: f32,
    max_range: f32,
    step_delta_out: *mut u32,
) -> StepxStatus {
    let distance = (has_distance != 0).then_some(distance);
    push(
        engine,
        RawSample::proximity(timestamp_ms, distance, max_range),
        step_delta_out,
    )
}

/// Push a cumulative hardware step counter value.
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `step_delta_out` may be NULL.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_push_step_counter(
    engine: *mut StepxEngine,
    timestamp_ms: u64,
    cumulative: u32,
    step_delta_out: *mut u32,
) -> StepxStatus {
    push(
        engine,
        RawSample::step_counter(timestamp_ms, cumulative),
        step_delta_out,
    )
}

/// Push a hardware step detector pulse.
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `step_delta_out` may be NULL.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_push_step_pulse(
    engine: *mut StepxEngine,
    timestamp_ms: u64,
    step_delta_out: *mut u32,
) -> StepxStatus {
    push(engine, RawSample::step_pulse(timestamp_ms), step_delta_out)
}

/// Push a raw accelerometer reading in m/s² (gravity included).
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `step_delta_out` may be NULL.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_push_accelerometer(
    engine: *mut StepxEngine,
    timestamp_ms: u64,
    accel_x: f32,
    accel_y: f32,
    accel_z: f32,
    step_delta_out: *mut u32,
) -> StepxStatus {
    push(
        engine,
        RawSample::accelerometer(timestamp_ms, [accel_x, accel_y, accel_z]),
        step_delta_out,
    )
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Enable or disable pocket detection.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_set_pocket_detection(
    engine: *const StepxEngine,
    enabled: i32,
) -> StepxStatus {
    if engine.is_null() {
        return StepxStatus::NullPointer;
    }
    (*engine).settings.set_pocket_detection(enabled != 0);
    StepxStatus::Ok
}

/// Enable or disable the dim-light reminder.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_set_light_reminder(
    engine: *const StepxEngine,
    enabled: i32,
) -> StepxStatus {
    if engine.is_null() {
        return StepxStatus::NullPointer;
    }
    (*engine).settings.set_light_reminder(enabled != 0);
    StepxStatus::Ok
}

/// Poll the dim-light reminder. Call about once per second.
///
/// # Safety
/// - `engine` must be a valid pointer.
///
/// # Returns
/// - 1 if a reminder is due, 0 if not, -1 on NULL engine.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_check_light_reminder(
    engine: *mut StepxEngine,
    now_ms: u64,
) -> i32 {
    if engine.is_null() {
        return -1;
    }
    i32::from((*engine).engine.check_light_reminder(now_ms))
}

// ============================================================================
// STATUS QUERIES
// ============================================================================

/// Copy the current snapshot into `output`.
///
/// # Safety
/// - `engine` must be a valid pointer.
/// - `output` must be a valid pointer to receive results.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_snapshot(
    engine: *const StepxEngine,
    output: *mut StepxOutputs,
) -> StepxStatus {
    if engine.is_null() || output.is_null() {
        return StepxStatus::NullPointer;
    }
    let engine = &(*engine).engine;
    *output = StepxOutputs::from_outputs(&engine.outputs(), engine.config().daily_goal);
    StepxStatus::Ok
}

/// Get the current snapshot as JSON.
///
/// # Safety
/// - `engine` must be a valid pointer.
///
/// # Returns
/// - JSON string (MUST be freed with `stepx_free_string()`).
/// - NULL on error.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_snapshot_json(engine: *const StepxEngine) -> *mut c_char {
    if engine.is_null() {
        return ptr::null_mut();
    }
    let outputs = (*engine).engine.outputs();

    let json = match serde_json::to_string(&outputs) {
        Ok(json) => json,
        Err(err) => {
            warn!(%err, "failed to serialize snapshot");
            return ptr::null_mut();
        }
    };
    match CString::new(json) {
        Ok(cstring) => cstring.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Get the total number of steps.
///
/// # Safety
/// - `engine` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn stepx_engine_total_steps(engine: *const StepxEngine) -> i64 {
    if engine.is_null() {
        return -1;
    }
    i64::from((*engine).engine.total_steps())
}

/// Free a string returned by `stepx_engine_snapshot_json()`.
///
/// # Safety
/// - `ptr` must be a string returned by this library.
/// - Must not be called more than once for the same pointer.
#[no_mangle]
pub unsafe extern "C" fn stepx_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// VERSION INFO
// ============================================================================

/// Get the library version string.
///
/// # Returns
/// - Static string, do NOT free.
#[no_mangle]
pub extern "C" fn stepx_version() -> *const c_char {
    static VERSION: &[u8] = concat!("stepx-sensing/", env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

// ============================================================================
// TESTS
// ============================================================================
