//! Fixed timestep accumulator
//!
//! Turns wall-clock deltas into a whole number of fixed steps, carrying the
//! remainder over to the next call.

use tracing::warn;

/// Accumulator for fixed timestep updates
#[derive(Debug, Clone)]
pub struct PhysicsAccumulator {
    /// Accumulated time not yet consumed by a step
    accumulated: f32,
    /// Fixed timestep for physics updates
    pub fixed_timestep: f32,
    /// Most steps one call may produce
    pub max_steps: u32,
}

impl PhysicsAccumulator {
    pub fn new(fixed_timestep: f32, max_steps: u32) -> Self {
        Self {
            accumulated: 0.0,
            fixed_timestep,
            max_steps,
        }
    }

    /// Add delta time to the accumulator
    /// Returns the number of physics steps to perform
    pub fn accumulate(&mut self, delta_time: f32) -> u32 {
        if self.fixed_timestep <= 0.0 || self.max_steps == 0 {
            return 0;
        }

        self.accumulated += delta_time.max(0.0);

        // Prevent spiral of death: time beyond the step budget is dropped
        let budget = self.fixed_timestep * self.max_steps as f32;
        if self.accumulated >= budget {
            if self.accumulated > budget {
                warn!(
                    "Physics accumulator too large: {} seconds. Clamping to {} steps.",
                    self.accumulated, self.max_steps
                );
            }
            self.accumulated = 0.0;
            return self.max_steps;
        }

        let steps = ((self.accumulated / self.fixed_timestep) as u32).min(self.max_steps);
        self.accumulated -= steps as f32 * self.fixed_timestep;
        steps
    }

    pub fn accumulated_time(&self) -> f32 {
        self.accumulated
    }
}

impl Default for PhysicsAccumulator {
    fn default() -> Self {
        Self::new(1.0 / 60.0, 10)
    }
}
