//! Ambient light and pocket (coverage) tracking.
//!
//! The gate decides whether step counting is suppressed. Light and proximity
//! are independent inputs; suppression only applies when the caller says
//! pocket detection is enabled, and that flag is passed on every query.

use crate::types::{EnvironmentState, LightLevel};

/// Lux below which the environment counts as dim for the reminder.
pub const DIM_LUX_THRESHOLD: f32 = 200.0;

/// How long it must stay dim before a reminder fires.
pub const DIM_REMINDER_AFTER_MS: u64 = 10_000;

/// Tracks ambient light and coverage state.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentGate {
    state: EnvironmentState,
}

impl EnvironmentGate {
    /// Starts uncovered with 0 lx.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ambient light reading.
    pub fn on_light(&mut self, lux: f32) {
        self.state.ambient_lux = lux;
    }

    /// Record a proximity reading. A missing reading means "not covered".
    ///
    /// Coverage is recomputed from this reading alone, never accumulated.
    pub fn on_proximity(&mut self, reported: Option<f32>, max_range: f32) {
        let reported = reported.unwrap_or(max_range);
        self.state.is_covered = reported < max_range;
    }

    /// Whether step counting must be suppressed right now.
    pub fn is_suppressing(&self, pocket_detection_enabled: bool) -> bool {
        pocket_detection_enabled && self.state.is_covered
    }

    pub fn state(&self) -> EnvironmentState {
        self.state
    }

    pub fn ambient_lux(&self) -> f32 {
        self.state.ambient_lux
    }

    pub fn is_covered(&self) -> bool {
        self.state.is_covered
    }

    pub fn light_level(&self) -> LightLevel {
        self.state.light_level()
    }
}

/// Fires a reminder when the wearer has been in dim light for a while.
///
/// Driven by polling: call [`DimLightMonitor::poll`] periodically with the
/// current lux, so it fires even when the light sensor stops reporting.
#[derive(Debug, Clone, Default)]
pub struct DimLightMonitor {
    dim_since_ms: Option<u64>,
}

impl DimLightMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when a reminder is due.
    ///
    /// After firing, the dim timer restarts at `now_ms` so the reminder
    /// repeats at most once per interval.
    pub fn poll(&mut self, lux: f32, now_ms: u64, enabled: bool) -> bool {
        if !enabled || lux >= DIM_LUX_THRESHOLD {
            self.dim_since_ms = None;
            return false;
        }

        let since = *self.dim_since_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(since) > DIM_REMINDER_AFTER_MS {
            self.dim_since_ms = Some(now_ms);
            return true;
        }
        false
    }

    /// When the current dim stretch began, if it is dim.
    pub fn dim_since_ms(&self) -> Option<u64> {
        self.dim_since_ms
    }
}
