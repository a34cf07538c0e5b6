//! Step Detection Module.
//!
//! Turns raw samples into discrete step events using one of three source
//! policies, fixed for the lifetime of a detector:
//! - Counter delta: differences of a cumulative hardware step counter
//! - Pulse: one step per hardware step-detector pulse
//! - Peak detection: thresholded linear-acceleration magnitude with debounce
//!
//! Every policy respects the pocket gate. Malformed or irrelevant samples
//! produce no event; nothing here returns an error.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::environment::EnvironmentGate;
use crate::signal::GravityFilter;
use crate::types::{RawSample, SensorKind, SensorReading, StepEvent};

/// Linear acceleration magnitude a sample must exceed to count (m/s²).
pub const PEAK_THRESHOLD_MPS2: f32 = 1.2;

/// Minimum time between two accelerometer steps (ms).
pub const STEP_DEBOUNCE_MS: u64 = 300;

/// Which sensor drives step detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSource {
    /// Cumulative hardware step counter.
    #[default]
    HardwareCounter,
    /// Hardware step detector emitting one pulse per step.
    HardwarePulse,
    /// Peak detection on the raw accelerometer.
    Accelerometer,
}

/// Sensors the platform reported as present, plus the permission gating
/// the hardware step sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorAvailability {
    pub step_counter: bool,
    pub step_detector: bool,
    pub accelerometer: bool,
    /// Activity-recognition permission granted by the user.
    pub activity_permission: bool,
}

impl StepSource {
    /// Pick the preferred source: hardware counter, then hardware pulse,
    /// then the accelerometer. Hardware sources need the activity permission.
    pub fn select(available: SensorAvailability) -> Option<Self> {
        if available.activity_permission {
            if available.step_counter {
                return Some(StepSource::HardwareCounter);
            }
            if available.step_detector {
                return Some(StepSource::HardwarePulse);
            }
        }
        if available.accelerometer {
            return Some(StepSource::Accelerometer);
        }
        None
    }

    /// The sample kind this source consumes.
    pub fn sensor_kind(&self) -> SensorKind {
        match self {
            StepSource::HardwareCounter => SensorKind::StepCounter,
            StepSource::HardwarePulse => SensorKind::StepPulse,
            StepSource::Accelerometer => SensorKind::Accelerometer,
        }
    }
}

/// Seeding state of the hardware counter baseline.
///
/// The first raw value only seeds; it never produces steps, since the
/// counter usually reports totals since boot. Once seeded it never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterBaseline {
    #[default]
    Unseeded,
    Seeded(u32),
}

/// Step detector for a single, fixed source policy.
#[derive(Debug, Clone)]
pub struct StepDetector {
    source: StepSource,

    // Counter-delta policy
    baseline: CounterBaseline,

    // Peak-detection policy
    gravity: GravityFilter,
    last_step_ms: Option<u64>,
    last_magnitude: f32,
}

impl StepDetector {
    /// Create a detector for the given source.
    pub fn new(source: StepSource) -> Self {
        Self {
            source,
            baseline: CounterBaseline::Unseeded,
            gravity: GravityFilter::new(),
            last_step_ms: None,
            last_magnitude: 0.0,
        }
    }

    /// Process one sample and return a step event if one fired.
    ///
    /// `pocket_detection_enabled` must be the current setting; it is not cached.
    pub fn on_event(
        &mut self,
        sample: &RawSample,
        environment: &EnvironmentGate,
        pocket_detection_enabled: bool,
    ) -> Option<StepEvent> {
        if let Err(err) = sample.validate() {
            debug!(timestamp_ms = sample.timestamp_ms, %err, "dropping malformed sample");
            return None;
        }
        self.on_valid_event(sample, environment, pocket_detection_enabled)
    }

    /// [`StepDetector::on_event`] for a sample that already passed
    /// [`RawSample::validate`].
    pub(crate) fn on_valid_event(
        &mut self,
        sample: &RawSample,
        environment: &EnvironmentGate,
        pocket_detection_enabled: bool,
    ) -> Option<StepEvent> {
        // Gravity tracks every accelerometer sample, whichever policy is active.
        let magnitude = match sample.reading {
            SensorReading::Accelerometer { accel } => {
                let m = self.gravity.update_array(accel).magnitude();
                self.last_magnitude = m;
                Some(m)
            }
            _ => None,
        };

        if sample.kind() != self.source.sensor_kind() {
            return None;
        }

        let suppressed = environment.is_suppressing(pocket_detection_enabled);
        let event = match (self.source, sample.reading) {
            (StepSource::HardwareCounter, SensorReading::StepCounter { cumulative }) => {
                self.on_counter(sample.timestamp_ms, cumulative, suppressed)
            }
            (StepSource::HardwarePulse, SensorReading::StepPulse) => {
                (!suppressed).then(|| StepEvent::single(sample.timestamp_ms))
            }
            (StepSource::Accelerometer, SensorReading::Accelerometer { .. }) => {
                self.on_peak(sample.timestamp_ms, magnitude.unwrap_or(0.0), suppressed)
            }
            _ => None,
        };

        if let Some(event) = event {
            trace!(
                timestamp_ms = event.timestamp_ms(),
                count = event.count_delta(),
                source = ?self.source,
                "step event"
            );
        } else if suppressed {
            trace!(timestamp_ms = sample.timestamp_ms, "step counting suppressed");
        }
        event
    }

    /// Process a batch of samples with a fixed gate and flag.
    pub fn process_batch(
        &mut self,
        samples: &[RawSample],
        environment: &EnvironmentGate,
        pocket_detection_enabled: bool,
    ) -> Vec<StepEvent> {
        samples
            .iter()
            .filter_map(|s| self.on_event(s, environment, pocket_detection_enabled))
            .collect()
    }

    pub fn source(&self) -> StepSource {
        self.source
    }

    /// Current counter baseline.
    pub fn baseline(&self) -> CounterBaseline {
        self.baseline
    }

    /// Timestamp of the last accelerometer step, if any.
    pub fn last_step_ms(&self) -> Option<u64> {
        self.last_step_ms
    }

    /// Linear acceleration magnitude of the most recent accelerometer sample.
    pub fn last_magnitude(&self) -> f32 {
        self.last_magnitude
    }

    pub fn gravity_filter(&self) -> &GravityFilter {
        &self.gravity
    }

    // =========================================================================
    // PRIVATE METHODS
    // =========================================================================

    fn on_counter(&mut self, timestamp_ms: u64, raw: u32, suppressed: bool) -> Option<StepEvent> {
        let previous = match self.baseline {
            CounterBaseline::Unseeded => {
                debug!(raw, "seeding step counter baseline");
                self.baseline = CounterBaseline::Seeded(raw);
                return None;
            }
            CounterBaseline::Seeded(previous) => previous,
        };

        // A lower reading means the counter restarted (reboot); clamp to zero.
        let delta = raw.saturating_sub(previous);
        if raw < previous {
            debug!(previous, raw, "step counter went backwards, re-seeding");
        }
        self.baseline = CounterBaseline::Seeded(raw);

        if suppressed {
            return None;
        }
        StepEvent::new(timestamp_ms, delta)
    }

    fn on_peak(
        &mut self,
        timestamp_ms: u64,
        magnitude: f32,
        suppressed: bool,
    ) -> Option<StepEvent> {
        if suppressed || magnitude <= PEAK_THRESHOLD_MPS2 {
            return None;
        }

        if let Some(last) = self.last_step_ms {
            if timestamp_ms.saturating_sub(last) < STEP_DEBOUNCE_MS {
                return None;
            }
        }

        self.last_step_ms = Some(timestamp_ms);
        Some(StepEvent::single(timestamp_ms))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn covered_gate() -> EnvironmentGate {
        let mut gate = EnvironmentGate::new();
        gate.on_proximity(Some(0.0), 5.0);
        gate
    }

    /// Accelerometer samples at 50 Hz, converging gravity on z first.
    /// Settles in the pocket so the start-up transient fires no step.
    fn settled_detector() -> (StepDetector, u64) {
        let mut detector = StepDetector::new(StepSource::Accelerometer);
        let gate = covered_gate();
        let mut t = 0;
        for _ in 0..100 {
            detector.on_event(&RawSample::accelerometer(t, [0.0, 0.0, 9.81]), &gate, true);
            t += 20;
        }
        (detector, t)
    }

    #[test]
    fn test_source_selection_priority() {
        let all = SensorAvailability {
            step_counter: true,
            step_detector: true,
            accelerometer: true,
            activity_permission: true,
        };
        assert_eq!(StepSource::select(all), Some(StepSource::HardwareCounter));

        let no_counter = SensorAvailability {
            step_counter: false,
            ..all
        };
        assert_eq!(StepSource::select(no_counter), Some(StepSource::HardwarePulse));

        let no_permission = SensorAvailability {
            activity_permission: false,
            ..all
        };
        assert_eq!(StepSource::select(no_permission), Some(StepSource::Accelerometer));

        assert_eq!(StepSource::select(SensorAvailability::default()), None);
    }

    #[test]
    fn test_counter_seeding_and_delta() {
        let mut detector = StepDetector::new(StepSource::HardwareCounter);
        let gate = EnvironmentGate::new();

        assert!(detector
            .on_event(&RawSample::step_counter(0, 5000), &gate, true)
            .is_none());
        assert_eq!(detector.baseline(), CounterBaseline::Seeded(5000));

        let event = detector
            .on_event(&RawSample::step_counter(1000, 5004), &gate, true)
            .unwrap();
        assert_eq!(event.count_delta(), 4);
        assert_eq!(event.timestamp_ms(), 1000);
    }

    #[test]
    fn test_counter_reset_clamps_and_reseeds() {
        let mut detector = StepDetector::new(StepSource::HardwareCounter);
        let gate = EnvironmentGate::new();

        detector.on_event(&RawSample::step_counter(0, 5000), &gate, true);
        detector.on_event(&RawSample::step_counter(10, 5004), &gate, true);

        assert!(detector
            .on_event(&RawSample::step_counter(20, 10), &gate, true)
            .is_none());
        assert_eq!(detector.baseline(), CounterBaseline::Seeded(10));

        let event = detector
            .on_event(&RawSample::step_counter(30, 13), &gate, true)
            .unwrap();
        assert_eq!(event.count_delta(), 3);
    }

    #[test]
    fn test_counter_zero_seed_is_still_a_seed() {
        let mut detector = StepDetector::new(StepSource::HardwareCounter);
        let gate = EnvironmentGate::new();

        detector.on_event(&RawSample::step_counter(0, 0), &gate, false);
        let event = detector
            .on_event(&RawSample::step_counter(10, 2), &gate, false)
            .unwrap();
        assert_eq!(event.count_delta(), 2);
    }

    #[test]
    fn test_counter_baseline_advances_while_suppressed() {
        let mut detector = StepDetector::new(StepSource::HardwareCounter);
        let gate = covered_gate();

        detector.on_event(&RawSample::step_counter(0, 100), &gate, true);
        assert!(detector
            .on_event(&RawSample::step_counter(10, 110), &gate, true)
            .is_none());
        assert_eq!(detector.baseline(), CounterBaseline::Seeded(110));

        // Steps taken in the pocket are never replayed later.
        let open = EnvironmentGate::new();
        let event = detector
            .on_event(&RawSample::step_counter(20, 111), &open, true)
            .unwrap();
        assert_eq!(event.count_delta(), 1);
    }

    #[test]
    fn test_pulse_policy() {
        let mut detector = StepDetector::new(StepSource::HardwarePulse);
        let gate = EnvironmentGate::new();

        // No debounce: back-to-back pulses each count.
        let a = detector.on_event(&RawSample::step_pulse(0), &gate, true);
        let b = detector.on_event(&RawSample::step_pulse(1), &gate, true);
        assert_eq!(a.map(|e| e.count_delta()), Some(1));
        assert_eq!(b.map(|e| e.count_delta()), Some(1));

        let covered = covered_gate();
        assert!(detector
            .on_event(&RawSample::step_pulse(2), &covered, true)
            .is_none());
        assert!(detector
            .on_event(&RawSample::step_pulse(3), &covered, false)
            .is_some());
    }

    #[test]
    fn test_inactive_sources_are_ignored() {
        let mut detector = StepDetector::new(StepSource::HardwarePulse);
        let gate = EnvironmentGate::new();

        assert!(detector
            .on_event(&RawSample::step_counter(0, 10), &gate, false)
            .is_none());
        assert!(detector
            .on_event(&RawSample::step_counter(1, 20), &gate, false)
            .is_none());
        assert_eq!(detector.baseline(), CounterBaseline::Unseeded);
        assert!(detector
            .on_event(&RawSample::accelerometer(2, [30.0, 0.0, 0.0]), &gate, false)
            .is_none());
    }

    #[test]
    fn test_peak_detection_threshold() {
        let (mut detector, t) = settled_detector();
        let gate = EnvironmentGate::new();

        // Small jolt: linear x = 0.8 * 1.0 = 0.8, under threshold.
        assert!(detector
            .on_event(&RawSample::accelerometer(t, [1.0, 0.0, 9.81]), &gate, false)
            .is_none());

        // Large jolt well above threshold.
        let event = detector.on_event(
            &RawSample::accelerometer(t + 400, [4.0, 0.0, 9.81]),
            &gate,
            false,
        );
        assert!(event.is_some());
        assert_eq!(detector.last_step_ms(), Some(t + 400));
        assert!(detector.last_magnitude() > PEAK_THRESHOLD_MPS2);
    }

    #[test]
    fn test_peak_debounce() {
        let (mut detector, t) = settled_detector();
        let gate = EnvironmentGate::new();
        let jolt = |ts| RawSample::accelerometer(ts, [0.0, 0.0, 30.0]);

        assert!(detector.on_event(&jolt(t), &gate, false).is_some());
        assert!(detector.on_event(&jolt(t + 100), &gate, false).is_none());
        assert!(detector.on_event(&jolt(t + 299), &gate, false).is_none());
        // Debounce timer did not move on rejected samples.
        assert_eq!(detector.last_step_ms(), Some(t));
        assert!(detector.on_event(&jolt(t + 300), &gate, false).is_some());
    }

    #[test]
    fn test_peak_suppressed_in_pocket() {
        let (mut detector, t) = settled_detector();
        let covered = covered_gate();

        let jolt = RawSample::accelerometer(t, [0.0, 0.0, 30.0]);
        assert!(detector.on_event(&jolt, &covered, true).is_none());
        assert_eq!(detector.last_step_ms(), None);

        let jolt = RawSample::accelerometer(t + 20, [0.0, 0.0, 30.0]);
        assert!(detector.on_event(&jolt, &covered, false).is_some());
    }

    #[test]
    fn test_malformed_accel_leaves_gravity_untouched() {
        let (mut detector, t) = settled_detector();
        let gate = EnvironmentGate::new();
        let before = detector.gravity_filter().gravity();

        let bad = RawSample::accelerometer(t, [f32::NAN, 0.0, 9.81]);
        assert!(detector.on_event(&bad, &gate, false).is_none());
        assert_eq!(detector.gravity_filter().gravity(), before);
    }

    #[test]
    fn test_process_batch() {
        let mut detector = StepDetector::new(StepSource::HardwarePulse);
        let gate = EnvironmentGate::new();
        let samples: Vec<_> = (0..5).map(|i| RawSample::step_pulse(i * 500)).collect();

        let steps = detector.process_batch(&samples, &gate, true);
        assert_eq!(steps.len(), 5);
    }
}
