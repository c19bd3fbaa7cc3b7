//! Training-loop configuration.

use serde::{Deserialize, Serialize};

use super::replay_training::ReplayTrainingOptions;
use crate::error::{PhasicError, Result};

/// Configuration for the [`Trainer`](super::Trainer) loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Rollout steps collected per environment per iteration.
    pub unroll_length: usize,
    /// Rows per minibatch.
    pub mini_batch_size: usize,
    /// Passes over the gathered experience per iteration.
    pub num_updates_per_train_iter: usize,
    /// Training iterations to run.
    pub num_iterations: usize,
    /// Clear the replay buffer after training on it.
    pub clear_replay_buffer: bool,
    /// Default chance of sampling (instead of argmax) in `predict_step`.
    pub epsilon_greedy: f32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            unroll_length: 32,
            mini_batch_size: 128,
            num_updates_per_train_iter: 4,
            num_iterations: 200,
            clear_replay_buffer: true,
            epsilon_greedy: 0.1,
        }
    }
}

impl TrainerConfig {
    /// Create a new trainer configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder methods
    pub fn with_unroll_length(mut self, unroll_length: usize) -> Self {
        self.unroll_length = unroll_length;
        self
    }

    pub fn with_mini_batch_size(mut self, size: usize) -> Self {
        self.mini_batch_size = size;
        self
    }

    pub fn with_num_updates_per_train_iter(mut self, updates: usize) -> Self {
        self.num_updates_per_train_iter = updates;
        self
    }

    pub fn with_num_iterations(mut self, iterations: usize) -> Self {
        self.num_iterations = iterations;
        self
    }

    pub fn with_clear_replay_buffer(mut self, clear: bool) -> Self {
        self.clear_replay_buffer = clear;
        self
    }

    pub fn with_epsilon_greedy(mut self, epsilon: f32) -> Self {
        self.epsilon_greedy = epsilon;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.unroll_length == 0 {
            return Err(PhasicError::config("unroll_length must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.epsilon_greedy) {
            return Err(PhasicError::config(format!(
                "epsilon_greedy must be in [0, 1], got {}",
                self.epsilon_greedy
            )));
        }
        self.replay_options().validate()
    }

    /// Options for the per-iteration `train_from_replay_buffer` call.
    pub fn replay_options(&self) -> ReplayTrainingOptions {
        ReplayTrainingOptions {
            mini_batch_size: self.mini_batch_size,
            num_updates_per_train_iter: self.num_updates_per_train_iter,
            clear_replay_buffer: self.clear_replay_buffer,
        }
    }
}
