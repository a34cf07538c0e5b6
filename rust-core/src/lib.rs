//! StepX Sensing Library
//!
//! A step-tracking engine that turns a stream of raw motion, light and
//! proximity samples into a running step count, an activity classification,
//! instantaneous speed, cumulative distance and estimated calories, while
//! suppressing steps when the device is judged to be in a pocket.
//!
//! # Design Philosophy
//!
//! - **Pure and synchronous**: one sample in, state updated, no I/O. The
//!   engine never decides when sensors run and never persists anything.
//! - **Degrade silently**: malformed samples are no-ops; the sample path
//!   has no error returns.
//! - **Explicit collaborators**: the durable step total and the runtime
//!   settings are traits handed to the engine at construction.
//!
//! # Example
//!
//! ```
//! use stepx_sensing::{
//!     EngineConfig, InMemoryStore, RawSample, StaticSettings, StepEngine, StepSource,
//! };
//!
//! let config = EngineConfig::for_source(StepSource::HardwareCounter);
//! let mut engine = StepEngine::new(config, InMemoryStore::new(0), StaticSettings::default())?;
//!
//! // The first counter value only seeds the baseline.
//! engine.process_sample(&RawSample::step_counter(0, 5000));
//! engine.process_sample(&RawSample::step_counter(1000, 5004));
//!
//! assert_eq!(engine.outputs().total_steps, 4);
//! # Ok::<(), stepx_sensing::EngineError>(())
//! ```

pub mod cadence;
pub mod environment;
pub mod error;
pub mod ffi;
pub mod metrics;
pub mod pipeline;
pub mod signal;
pub mod step_detection;
pub mod store;
pub mod types;

#[cfg(test)]
mod stress_tests;

// Re-export commonly used types
pub use cadence::{CadenceClassifier, CadenceWindow};
pub use environment::{DimLightMonitor, EnvironmentGate};
pub use error::{EngineError, SampleError, StoreError};
pub use metrics::{goal_progress, MetricsCalculator};
pub use pipeline::{EngineConfig, SnapshotHandle, StepEngine};
pub use signal::GravityFilter;
pub use step_detection::{CounterBaseline, SensorAvailability, StepDetector, StepSource};
pub use store::{
    BackgroundStore, InMemoryStore, SettingsSource, SharedSettings, StaticSettings, StepTotalStore,
};
pub use types::{
    ActivityState, DerivedMetrics, EngineOutputs, EnvironmentState, GravityEstimate, LightLevel,
    LinearAcceleration, PaceEstimate, RawSample, SensorKind, SensorReading, StepEvent,
};
