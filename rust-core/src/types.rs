//! Core data types for the StepX sensing engine.
//!
//! This module defines the values that flow through the step pipeline:
//! raw sensor samples in, step events in the middle, and the observable
//! engine outputs at the end.
//!
//! Design principle: Types should make intent obvious. If a concept exists,
//! it gets a type. Never pass raw tuples or untyped collections across boundaries.

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::SampleError;

/// Assumed step length while walking, in meters.
pub const WALKING_STRIDE_M: f32 = 0.75;

/// Assumed step length while running, in meters.
pub const RUNNING_STRIDE_M: f32 = 1.2;

/// Speed below which the wearer is considered stopped (m/s).
pub const STOPPED_SPEED_MPS: f32 = 0.2;

/// Speed at or above which the wearer is considered running (m/s).
pub const RUNNING_SPEED_MPS: f32 = 2.0;

/// Lux at or above which ambient light counts as bright.
pub const BRIGHT_LUX: f32 = 1000.0;

/// A single raw sensor sample as delivered by the platform.
///
/// This is the minimal input contract: a monotonic timestamp and one typed
/// reading. Samples are immutable and consumed exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Monotonic timestamp in milliseconds. Required for debounce and cadence.
    pub timestamp_ms: u64,

    /// The sensor reading carried by this sample.
    #[serde(flatten)]
    pub reading: SensorReading,
}

/// Reading payload, one variant per sensor kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SensorReading {
    /// Ambient light in lux.
    Light {
        /// Illuminance in lux.
        lux: f32,
    },
    /// Proximity distance reported against the sensor's maximum range.
    Proximity {
        /// Reported distance; `None` when the platform delivered no value.
        #[serde(default)]
        distance: Option<f32>,
        /// Maximum range of the proximity sensor.
        max_range: f32,
    },
    /// Cumulative hardware step counter (usually counts since boot).
    StepCounter {
        /// Raw cumulative count.
        cumulative: u32,
    },
    /// One hardware step-detector pulse, i.e. exactly one step.
    StepPulse,
    /// Raw accelerometer reading [x, y, z] in m/s², gravity included.
    Accelerometer {
        /// Acceleration vector.
        accel: [f32; 3],
    },
}

/// Sensor kind, without payload. Used for source matching and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Light,
    Proximity,
    StepCounter,
    StepPulse,
    Accelerometer,
}

impl RawSample {
    /// Creates an ambient light sample.
    pub fn light(timestamp_ms: u64, lux: f32) -> Self {
        Self {
            timestamp_ms,
            reading: SensorReading::Light { lux },
        }
    }

    /// Creates a proximity sample. Pass `None` when the reading was absent.
    pub fn proximity(timestamp_ms: u64, distance: Option<f32>, max_range: f32) -> Self {
        Self {
            timestamp_ms,
            reading: SensorReading::Proximity {
                distance,
                max_range,
            },
        }
    }

    /// Creates a cumulative step counter sample.
    pub fn step_counter(timestamp_ms: u64, cumulative: u32) -> Self {
        Self {
            timestamp_ms,
            reading: SensorReading::StepCounter { cumulative },
        }
    }

    /// Creates a step detector pulse.
    pub fn step_pulse(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            reading: SensorReading::StepPulse,
        }
    }

    /// Creates an accelerometer sample.
    pub fn accelerometer(timestamp_ms: u64, accel: [f32; 3]) -> Self {
        Self {
            timestamp_ms,
            reading: SensorReading::Accelerometer { accel },
        }
    }

    /// The kind of sensor that produced this sample.
    pub fn kind(&self) -> SensorKind {
        match self.reading {
            SensorReading::Light { .. } => SensorKind::Light,
            SensorReading::Proximity { .. } => SensorKind::Proximity,
            SensorReading::StepCounter { .. } => SensorKind::StepCounter,
            SensorReading::StepPulse => SensorKind::StepPulse,
            SensorReading::Accelerometer { .. } => SensorKind::Accelerometer,
        }
    }

    /// Checks the payload for values no real sensor produces.
    ///
    /// A missing proximity distance is not an error: it means "not covered".
    pub fn validate(&self) -> Result<(), SampleError> {
        match self.reading {
            SensorReading::Light { lux } => {
                if !lux.is_finite() {
                    return Err(SampleError::NonFinite { field: "lux" });
                }
                if lux < 0.0 {
                    return Err(SampleError::OutOfRange {
                        field: "lux",
                        value: lux,
                    });
                }
            }
            SensorReading::Proximity {
                distance,
                max_range,
            } => {
                if !max_range.is_finite() {
                    return Err(SampleError::NonFinite { field: "max_range" });
                }
                if max_range <= 0.0 {
                    return Err(SampleError::OutOfRange {
                        field: "max_range",
                        value: max_range,
                    });
                }
                if let Some(d) = distance {
                    if !d.is_finite() {
                        return Err(SampleError::NonFinite { field: "distance" });
                    }
                }
            }
            SensorReading::Accelerometer { accel } => {
                if accel.iter().any(|v| !v.is_finite()) {
                    return Err(SampleError::NonFinite { field: "accel" });
                }
            }
            SensorReading::StepCounter { .. } | SensorReading::StepPulse => {}
        }
        Ok(())
    }
}

/// Exponentially smoothed gravity vector in m/s².
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GravityEstimate {
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

impl GravityEstimate {
    /// Gravity as an array, for arithmetic convenience.
    pub fn as_array(&self) -> [f32; 3] {
        [self.gx, self.gy, self.gz]
    }
}

/// Acceleration with the gravity estimate removed, in m/s².
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LinearAcceleration {
    pub lx: f32,
    pub ly: f32,
    pub lz: f32,
}

impl LinearAcceleration {
    /// Euclidean magnitude of the motion signal.
    pub fn magnitude(&self) -> f32 {
        (self.lx * self.lx + self.ly * self.ly + self.lz * self.lz).sqrt()
    }
}

/// Coarse ambient light classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightLevel {
    Dim,
    Bright,
}

impl LightLevel {
    /// Classify an illuminance value. Bright starts at 1000 lx inclusive.
    pub fn from_lux(lux: f32) -> Self {
        if lux >= BRIGHT_LUX {
            LightLevel::Bright
        } else {
            LightLevel::Dim
        }
    }
}

/// Ambient light and coverage, as last reported.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentState {
    /// Last reported illuminance in lux.
    pub ambient_lux: f32,
    /// Whether the proximity sensor reports an obstruction.
    pub is_covered: bool,
}

impl EnvironmentState {
    pub fn light_level(&self) -> LightLevel {
        LightLevel::from_lux(self.ambient_lux)
    }
}

/// One or more steps detected at a single instant.
///
/// Step events are ephemeral: produced by the detector, consumed by the
/// cadence window and the total-step accumulator, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepEvent {
    timestamp_ms: u64,
    count_delta: NonZeroU32,
}

impl StepEvent {
    /// Creates a step event. Returns `None` for a zero delta, which is not a step.
    pub fn new(timestamp_ms: u64, count_delta: u32) -> Option<Self> {
        NonZeroU32::new(count_delta).map(|count_delta| Self {
            timestamp_ms,
            count_delta,
        })
    }

    /// Creates a single-step event.
    pub fn single(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            count_delta: NonZeroU32::MIN,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Number of steps represented by this event (always ≥ 1).
    pub fn count_delta(&self) -> u32 {
        self.count_delta.get()
    }
}

/// Activity classification derived from speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ActivityState {
    #[default]
    Stopped,
    Walking,
    Running,
}

impl ActivityState {
    /// Classify a speed in m/s. Each boundary belongs to the faster state.
    pub fn from_speed(speed_mps: f32) -> Self {
        if speed_mps < STOPPED_SPEED_MPS {
            ActivityState::Stopped
        } else if speed_mps < RUNNING_SPEED_MPS {
            ActivityState::Walking
        } else {
            ActivityState::Running
        }
    }

    /// Stride attributed to every counted step while in this state.
    pub fn stride_length_m(&self) -> f32 {
        match self {
            ActivityState::Running => RUNNING_STRIDE_M,
            ActivityState::Stopped | ActivityState::Walking => WALKING_STRIDE_M,
        }
    }

    /// Energy attributed to every counted step while in this state (kcal).
    pub fn calories_per_step(&self) -> f32 {
        match self {
            ActivityState::Running => 0.1,
            ActivityState::Stopped | ActivityState::Walking => 0.05,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityState::Stopped => "Stopped",
            ActivityState::Walking => "Walking",
            ActivityState::Running => "Running",
        }
    }
}

/// Speed and activity after a step event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PaceEstimate {
    pub cadence_hz: f32,
    pub speed_mps: f32,
    pub activity: ActivityState,
}

/// Cumulative distance and energy derived from the total step count.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DerivedMetrics {
    pub distance_m: f32,
    pub calories_kcal: f32,
}

/// The externally observable engine state.
///
/// Every field is recomputed deterministically from internal state plus the
/// mirrored total step count, so snapshots are idempotent and safe to poll.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineOutputs {
    pub total_steps: u32,
    pub speed_mps: f32,
    pub activity: ActivityState,
    pub distance_m: f32,
    pub calories_kcal: f32,
    pub ambient_lux: f32,
    pub is_covered: bool,
}

impl EngineOutputs {
    /// Fraction of a daily goal reached, in [0, 1].
    pub fn goal_progress(&self, daily_goal: u32) -> f32 {
        crate::metrics::goal_progress(self.total_steps, daily_goal)
    }

    pub fn light_level(&self) -> LightLevel {
        LightLevel::from_lux(self.ambient_lux)
    }
}
