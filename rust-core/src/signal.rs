//! Gravity separation for the accelerometer step policy.
//!
//! This module provides the low-level signal step of the pipeline:
//! - Gravity vector estimation using an incremental low-pass filter
//! - Linear acceleration extraction (raw minus gravity)
//!
//! Design note: The filter is O(1) per sample with no history buffer.
//! The smoothing coefficient is a fixed constant, not configuration.

use crate::types::{GravityEstimate, LinearAcceleration};

/// Weight of the previous gravity estimate in each update.
///
/// At typical UI sensor rates this rejects slow orientation drift while
/// leaving 1-3 Hz gait content in the linear signal.
pub const GRAVITY_ALPHA: f32 = 0.8;

/// Low-pass gravity tracker.
///
/// Starts at (0, 0, 0) and is never reset: gravity is a physical constant
/// being tracked, not per-session state.
#[derive(Debug, Clone, Default)]
pub struct GravityFilter {
    gravity: GravityEstimate,

    /// Number of samples processed (for diagnostics).
    sample_count: u64,
}

impl GravityFilter {
    /// Create a filter with a zero gravity estimate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a filter starting from a known gravity estimate.
    pub fn with_initial(gravity: GravityEstimate) -> Self {
        Self {
            gravity,
            sample_count: 0,
        }
    }

    /// Update the gravity estimate and return the linear acceleration.
    ///
    /// `g[t] = α·g[t-1] + (1-α)·raw[t]`, then `linear = raw - g[t]`.
    pub fn update(&mut self, ax: f32, ay: f32, az: f32) -> LinearAcceleration {
        let g = &mut self.gravity;
        g.gx = GRAVITY_ALPHA * g.gx + (1.0 - GRAVITY_ALPHA) * ax;
        g.gy = GRAVITY_ALPHA * g.gy + (1.0 - GRAVITY_ALPHA) * ay;
        g.gz = GRAVITY_ALPHA * g.gz + (1.0 - GRAVITY_ALPHA) * az;

        self.sample_count += 1;

        LinearAcceleration {
            lx: ax - g.gx,
            ly: ay - g.gy,
            lz: az - g.gz,
        }
    }

    /// Convenience wrapper over [`GravityFilter::update`] for array input.
    pub fn update_array(&mut self, accel: [f32; 3]) -> LinearAcceleration {
        self.update(accel[0], accel[1], accel[2])
    }

    /// Get the current gravity estimate.
    pub fn gravity(&self) -> GravityEstimate {
        self.gravity
    }

    /// Get the gravity magnitude in m/s².
    pub fn gravity_magnitude(&self) -> f32 {
        let [x, y, z] = self.gravity.as_array();
        (x * x + y * y + z * z).sqrt()
    }

    /// Get the number of samples processed.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }
}
