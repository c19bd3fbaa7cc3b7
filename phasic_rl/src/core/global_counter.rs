//! Monotonic training clock and progress snapshot.
//!
//! The counter is owned by the training driver and handed to triggers and
//! schedulers as an explicit read-only input, so both can be tested with
//! synthetic counter values.

use serde::{Deserialize, Serialize};

/// Monotonically increasing global step counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlobalCounter(u64);

impl GlobalCounter {
    /// Start at zero.
    pub fn new() -> Self {
        Self(0)
    }

    /// Start at an arbitrary value.
    pub fn starting_at(value: u64) -> Self {
        Self(value)
    }

    /// Current value.
    #[inline]
    pub fn get(&self) -> u64 {
        self.0
    }

    /// Advance by one and return the new value.
    pub fn increment(&mut self) -> u64 {
        self.0 = self.0.saturating_add(1);
        self.0
    }
}

/// Snapshot of every notion of training progress a scheduler may follow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingProgress {
    /// Fraction of training completed, in [0, 1].
    pub percent: f64,
    /// Completed training iterations.
    pub iterations: u64,
    /// Environment steps taken.
    pub env_steps: u64,
    /// Global counter value.
    pub global_counter: u64,
}

impl TrainingProgress {
    /// Progress measured only by the global counter.
    pub fn at_counter(counter: u64) -> Self {
        Self {
            global_counter: counter,
            ..Default::default()
        }
    }

    /// Progress after `iterations` out of `total_iterations`.
    pub fn at_iteration(iterations: u64, total_iterations: u64) -> Self {
        let percent = if total_iterations == 0 {
            0.0
        } else {
            (iterations as f64 / total_iterations as f64).min(1.0)
        };
        Self {
            percent,
            iterations,
            ..Default::default()
        }
    }

    pub fn with_env_steps(mut self, env_steps: u64) -> Self {
        self.env_steps = env_steps;
        self
    }

    pub fn with_global_counter(mut self, counter: u64) -> Self {
        self.global_counter = counter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_is_monotonic() {
        let mut counter = GlobalCounter::new();
        assert_eq!(counter.get(), 0);
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);

        let mut maxed = GlobalCounter::starting_at(u64::MAX);
        assert_eq!(maxed.increment(), u64::MAX);
    }

    #[test]
    fn test_progress_percent_is_clamped() {
        assert_eq!(TrainingProgress::at_iteration(5, 10).percent, 0.5);
        assert_eq!(TrainingProgress::at_iteration(15, 10).percent, 1.0);
        assert_eq!(TrainingProgress::at_iteration(3, 0).percent, 0.0);
    }
}
