//! Distance, calories and goal progress from the total step count.
//!
//! Distance and calories apply the stride and energy constants of the
//! *current* activity to the entire total, so both jump retroactively when
//! the activity state changes.

use crate::types::{ActivityState, DerivedMetrics};

/// Stateless calculator for the derived metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Distance in meters and energy in kcal for `total_steps`.
    pub fn recompute(&self, total_steps: u32, activity: ActivityState) -> DerivedMetrics {
        let steps = total_steps as f32;
        DerivedMetrics {
            distance_m: steps * activity.stride_length_m(),
            calories_kcal: steps * activity.calories_per_step(),
        }
    }
}

/// Fraction of `daily_goal` reached, clamped to [0, 1].
///
/// A zero goal is treated as a goal of one step.
pub fn goal_progress(total_steps: u32, daily_goal: u32) -> f32 {
    let goal = daily_goal.max(1);
    let clamped = total_steps.min(goal);
    (clamped as f32 / goal as f32).clamp(0.0, 1.0)
}
