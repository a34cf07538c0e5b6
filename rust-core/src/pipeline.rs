//! Complete step-tracking engine integrating all sensor processing stages.
//!
//! This module orchestrates the data flow from raw sensor samples through
//! environment gating, step detection, cadence classification and derived
//! metrics to the observable [`EngineOutputs`] snapshot.
//!
//! # Architecture
//!
//! Each sample is processed to completion before the next is accepted:
//! 1. **Validation**: malformed samples are dropped as no-ops
//! 2. **Environment**: light and proximity update the pocket gate
//! 3. **Detection**: the active source policy may emit a step event
//! 4. **Accounting**: the in-memory total grows and the increment is
//!    dispatched to the durable counter without waiting
//! 5. **Cadence & Metrics**: speed, activity, distance and calories
//! 6. **Publishing**: the snapshot is stored for polling and pushed to
//!    subscribers when it changed
//!
//! `&mut self` on every mutating call is the serialization guarantee:
//! callers with several producer threads must funnel samples through one.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cadence::CadenceClassifier;
use crate::environment::{DimLightMonitor, EnvironmentGate};
use crate::error::{EngineError, Result};
use crate::metrics::{goal_progress, MetricsCalculator};
use crate::step_detection::{StepDetector, StepSource};
use crate::store::{SettingsSource, StepTotalStore};
use crate::types::*;

/// Configuration for the step engine.
///
/// Algorithm constants (filter coefficient, thresholds, strides, window
/// size) are fixed constants, not configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sensor driving step detection, chosen once at startup.
    pub step_source: StepSource,

    /// Daily step goal used for progress reporting. Must be at least 1.
    pub daily_goal: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_source: StepSource::HardwareCounter,
            daily_goal: 10_000,
        }
    }
}

impl EngineConfig {
    /// Config for a given source with default goal.
    pub fn for_source(step_source: StepSource) -> Self {
        Self {
            step_source,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.daily_goal == 0 {
            return Err(EngineError::invalid_config("daily_goal must be at least 1"));
        }
        Ok(())
    }
}

/// Cloneable read handle on the latest engine snapshot.
///
/// Safe to poll from any thread while the engine keeps processing.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    latest: Arc<RwLock<EngineOutputs>>,
}

impl SnapshotHandle {
    pub fn latest(&self) -> EngineOutputs {
        *self.latest.read()
    }
}

/// Stores the latest snapshot and pushes changes to subscribers.
///
/// Each subscriber holds at most one pending snapshot. A subscriber that
/// has not taken the pending one skips newer snapshots until it does.
#[derive(Debug)]
struct SnapshotPublisher {
    latest: Arc<RwLock<EngineOutputs>>,
    subscribers: Vec<Sender<EngineOutputs>>,
}

impl SnapshotPublisher {
    fn new(initial: EngineOutputs) -> Self {
        Self {
            latest: Arc::new(RwLock::new(initial)),
            subscribers: Vec::new(),
        }
    }

    /// Returns true if the snapshot changed.
    fn publish(&mut self, outputs: EngineOutputs) -> bool {
        {
            let mut latest = self.latest.write();
            if *latest == outputs {
                return false;
            }
            *latest = outputs;
        }
        // Subscribers whose receiver was dropped are forgotten.
        self.subscribers.retain(|tx| match tx.try_send(outputs) {
            Ok(()) | Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        true
    }

    fn subscribe(&mut self) -> Receiver<EngineOutputs> {
        let (tx, rx) = bounded(1);
        let current = *self.latest.read();
        if tx.try_send(current).is_ok() {
            self.subscribers.push(tx);
        }
        rx
    }

    fn handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            latest: Arc::clone(&self.latest),
        }
    }
}

/// The step-tracking engine.
///
/// Owns the gravity estimate, environment state, cadence window and
/// debounce timers. Mirrors the durable total step count in memory; the
/// mirror is the source of truth for everything computed this session.
pub struct StepEngine<S, C> {
    config: EngineConfig,
    store: S,
    settings: C,

    // Processing stages
    environment: EnvironmentGate,
    detector: StepDetector,
    cadence: CadenceClassifier,
    metrics: MetricsCalculator,
    dim_light: DimLightMonitor,

    // Derived state
    total_steps: u32,
    pace: PaceEstimate,
    derived: DerivedMetrics,

    publisher: SnapshotPublisher,
    samples_processed: u64,
}

impl<S, C> StepEngine<S, C>
where
    S: StepTotalStore,
    C: SettingsSource,
{
    /// Creates an engine, seeding the step total from the durable store.
    pub fn new(config: EngineConfig, store: S, settings: C) -> Result<Self> {
        config.validate()?;
        let total_steps = store.read_total()?;

        let metrics = MetricsCalculator::new();
        let pace = PaceEstimate::default();
        let derived = metrics.recompute(total_steps, pace.activity);
        let environment = EnvironmentGate::new();

        let initial = Self::assemble_outputs(total_steps, &pace, &derived, &environment);

        info!(
            source = ?config.step_source,
            total_steps,
            "step engine started"
        );

        Ok(Self {
            detector: StepDetector::new(config.step_source),
            config,
            store,
            settings,
            environment,
            cadence: CadenceClassifier::new(),
            metrics,
            dim_light: DimLightMonitor::new(),
            total_steps,
            pace,
            derived,
            publisher: SnapshotPublisher::new(initial),
            samples_processed: 0,
        })
    }

    /// Processes a single raw sample through the entire pipeline.
    ///
    /// Returns the step event it produced, if any. Never fails: malformed
    /// samples change nothing.
    pub fn process_sample(&mut self, sample: &RawSample) -> Option<StepEvent> {
        self.samples_processed += 1;

        if let Err(err) = sample.validate() {
            debug!(
                timestamp_ms = sample.timestamp_ms,
                kind = ?sample.kind(),
                %err,
                "ignoring malformed sample"
            );
            return None;
        }

        // Stage 1: Environment
        match sample.reading {
            SensorReading::Light { lux } => self.environment.on_light(lux),
            SensorReading::Proximity {
                distance,
                max_range,
            } => self.environment.on_proximity(distance, max_range),
            _ => {}
        }

        // Stage 2: Detection, with the setting re-read for this sample
        let pocket_detection = self.pocket_detection_enabled();
        let event = self
            .detector
            .on_valid_event(sample, &self.environment, pocket_detection);

        // Stage 3: Accounting, cadence and metrics
        if let Some(event) = &event {
            self.apply_step(event);
        }

        // Stage 4: Publishing
        self.publisher.publish(self.outputs());

        event
    }

    /// Processes samples in order and returns every step event produced.
    pub fn process_batch(&mut self, samples: &[RawSample]) -> Vec<StepEvent> {
        samples
            .iter()
            .filter_map(|sample| self.process_sample(sample))
            .collect()
    }

    /// Polls the dim-light reminder. Returns true when a reminder is due.
    ///
    /// Call periodically (about once a second) with a monotonic clock.
    pub fn check_light_reminder(&mut self, now_ms: u64) -> bool {
        let enabled = self.settings.light_reminder_enabled().unwrap_or(false);
        let due = self
            .dim_light
            .poll(self.environment.ambient_lux(), now_ms, enabled);
        if due {
            debug!(now_ms, lux = self.environment.ambient_lux(), "dim light reminder due");
        }
        due
    }

    /// Current observable state.
    pub fn outputs(&self) -> EngineOutputs {
        Self::assemble_outputs(self.total_steps, &self.pace, &self.derived, &self.environment)
    }

    /// Handle for polling snapshots from other threads.
    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.publisher.handle()
    }

    /// Subscribes to snapshot changes. The current snapshot is delivered first.
    ///
    /// The channel holds one snapshot; changes published while it is full
    /// are skipped. [`SnapshotHandle::latest`] always has the newest.
    pub fn subscribe(&mut self) -> Receiver<EngineOutputs> {
        self.publisher.subscribe()
    }

    /// Fraction of the configured daily goal reached.
    pub fn goal_progress(&self) -> f32 {
        goal_progress(self.total_steps, self.config.daily_goal)
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    pub fn pace(&self) -> PaceEstimate {
        self.pace
    }

    pub fn environment(&self) -> &EnvironmentGate {
        &self.environment
    }

    pub fn detector(&self) -> &StepDetector {
        &self.detector
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &C {
        &self.settings
    }

    /// Returns the total sample count processed so far, malformed included.
    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    fn pocket_detection_enabled(&self) -> bool {
        self.settings.pocket_detection_enabled().unwrap_or(false)
    }

    fn apply_step(&mut self, event: &StepEvent) {
        let delta = event.count_delta();

        // Optimistic: the mirror moves regardless of the durable write.
        self.total_steps = self.total_steps.saturating_add(delta);
        if let Err(err) = self.store.increment_total(delta) {
            warn!(delta, %err, "failed to dispatch step increment");
        }

        self.pace = self.cadence.on_step_event(event);
        self.derived = self.metrics.recompute(self.total_steps, self.pace.activity);
    }

    fn assemble_outputs(
        total_steps: u32,
        pace: &PaceEstimate,
        derived: &DerivedMetrics,
        environment: &EnvironmentGate,
    ) -> EngineOutputs {
        let env = environment.state();
        EngineOutputs {
            total_steps,
            speed_mps: pace.speed_mps,
            activity: pace.activity,
            distance_m: derived.distance_m,
            calories_kcal: derived.calories_kcal,
            ambient_lux: env.ambient_lux,
            is_covered: env.is_covered,
        }
    }
}
