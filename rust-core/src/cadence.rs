//! Cadence, speed and activity classification.
//!
//! Keeps the timestamps of the last few step events and derives an
//! instantaneous cadence from them. Speed uses a two-piece stride model:
//! stride length grows with pace. Activity is a pure function of speed.

use std::collections::VecDeque;

use crate::types::{
    ActivityState, PaceEstimate, StepEvent, RUNNING_STRIDE_M, WALKING_STRIDE_M,
};

/// Number of step timestamps kept for cadence.
pub const CADENCE_WINDOW_LEN: usize = 5;

/// Cadence (steps/s) at which the running stride takes over.
pub const RUNNING_CADENCE_HZ: f32 = 1.5;

/// Bounded FIFO of recent step timestamps, oldest first.
#[derive(Debug, Clone)]
pub struct CadenceWindow {
    timestamps: VecDeque<u64>,
}

impl Default for CadenceWindow {
    fn default() -> Self {
        Self {
            timestamps: VecDeque::with_capacity(CADENCE_WINDOW_LEN + 1),
        }
    }
}

impl CadenceWindow {
    /// Append a timestamp, evicting the oldest beyond capacity.
    pub fn push(&mut self, timestamp_ms: u64) {
        self.timestamps.push_back(timestamp_ms);
        while self.timestamps.len() > CADENCE_WINDOW_LEN {
            self.timestamps.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Steps per second across the window; 0 with fewer than two entries
    /// or no elapsed time.
    pub fn cadence_hz(&self) -> f32 {
        let (Some(&oldest), Some(&newest)) = (self.timestamps.front(), self.timestamps.back())
        else {
            return 0.0;
        };
        if self.timestamps.len() < 2 {
            return 0.0;
        }

        let elapsed_s = newest.saturating_sub(oldest) as f32 / 1000.0;
        if elapsed_s > 0.0 {
            (self.timestamps.len() - 1) as f32 / elapsed_s
        } else {
            0.0
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &u64> {
        self.timestamps.iter()
    }
}

/// Speed from cadence using the walking/running stride model.
pub fn speed_from_cadence(cadence_hz: f32) -> f32 {
    if cadence_hz < RUNNING_CADENCE_HZ {
        cadence_hz * WALKING_STRIDE_M
    } else {
        cadence_hz * RUNNING_STRIDE_M
    }
}

/// Classifies pace from recent step events.
#[derive(Debug, Clone, Default)]
pub struct CadenceClassifier {
    window: CadenceWindow,
    current: PaceEstimate,
}

impl CadenceClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a step event and recompute speed and activity.
    ///
    /// One window entry per event, whatever its step count.
    pub fn on_step_event(&mut self, event: &StepEvent) -> PaceEstimate {
        self.window.push(event.timestamp_ms());

        let cadence_hz = self.window.cadence_hz();
        let speed_mps = speed_from_cadence(cadence_hz);
        self.current = PaceEstimate {
            cadence_hz,
            speed_mps,
            activity: ActivityState::from_speed(speed_mps),
        };
        self.current
    }

    /// Result of the most recent step event.
    pub fn current(&self) -> PaceEstimate {
        self.current
    }

    pub fn window(&self) -> &CadenceWindow {
        &self.window
    }
}
