//! Simulation configuration.

use std::time::Duration;

use crate::error::{Result, SimError};

/// Simulation configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Wall-clock seconds per logical tick
    pub seconds_per_tick: f64,
    /// Maximum immediate batches drained by one dispatch before the
    /// remaining immediate work is deferred to the next dispatch
    pub max_cascade_rounds: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seconds_per_tick: 0.001,    // 1 tick = 1 ms
            max_cascade_rounds: 10_000, // far above any legitimate cascade
        }
    }
}

impl SimConfig {
    /// Checks that the tick length and round limit are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.seconds_per_tick.is_finite() || self.seconds_per_tick <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "seconds_per_tick must be positive and finite, got {}",
                self.seconds_per_tick
            )));
        }
        if self.max_cascade_rounds == 0 {
            return Err(SimError::InvalidConfig(
                "max_cascade_rounds must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Length of one logical tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds_per_tick)
    }
}
