//! One training iteration over the contents of a replay buffer.
//!
//! ```text
//! gather_all ─► into_tensors ─► preprocess_experience
//!     └─► for each update: shuffle rows
//!             └─► for each minibatch: train_step ─► calc_loss ─► update_with_gradient
//! ```

use std::collections::BTreeMap;

use burn::tensor::backend::AutodiffBackend;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::algorithm::RlAlgorithm;
use crate::core::GlobalCounter;
use crate::error::{PhasicError, Result};

/// Minibatch settings for [`train_from_replay_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayTrainingOptions {
    /// Rows per minibatch.
    pub mini_batch_size: usize,
    /// Passes over the gathered rows.
    pub num_updates_per_train_iter: usize,
    /// Clear the buffer once training finished.
    pub clear_replay_buffer: bool,
}

impl Default for ReplayTrainingOptions {
    fn default() -> Self {
        Self {
            mini_batch_size: 128,
            num_updates_per_train_iter: 4,
            clear_replay_buffer: true,
        }
    }
}

impl ReplayTrainingOptions {
    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.mini_batch_size == 0 {
            return Err(PhasicError::config("mini_batch_size must be > 0"));
        }
        if self.num_updates_per_train_iter == 0 {
            return Err(PhasicError::config("num_updates_per_train_iter must be > 0"));
        }
        Ok(())
    }
}

/// Summary of one replay training call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayTrainingStats {
    /// Rows (environment steps) trained on.
    pub rows: usize,
    /// Gradient updates applied.
    pub minibatches: usize,
    /// Mean loss over all minibatches.
    pub mean_loss: f32,
    /// Mean of each named loss diagnostic.
    pub extra: BTreeMap<String, f32>,
}

/// Train `alg` on everything in its visible replay buffer.
///
/// Rows are shuffled with `rng` before every update, so a seeded `rng` makes
/// the minibatch order reproducible. Advances `counter` by one when given.
pub fn train_from_replay_buffer<B, A, R>(
    alg: &mut A,
    options: &ReplayTrainingOptions,
    counter: Option<&mut GlobalCounter>,
    rng: &mut R,
) -> Result<ReplayTrainingStats>
where
    B: AutodiffBackend,
    A: RlAlgorithm<B> + ?Sized,
    R: Rng + ?Sized,
{
    options.validate()?;

    let batch = alg.replay_buffer().gather_all()?;
    let batch_info = batch.batch_info();
    let device = alg.device();
    let (inputs, rollout_info) = batch.into_tensors::<B>(&device);
    let (inputs, train_info) = alg.preprocess_experience(inputs, rollout_info, batch_info)?;

    let rows = batch_info.rows();
    let mut indices: Vec<usize> = (0..rows).collect();
    let mut stats = ReplayTrainingStats {
        rows,
        ..Default::default()
    };
    let mut loss_sum = 0.0f32;

    for _update in 0..options.num_updates_per_train_iter {
        indices.shuffle(rng);

        for chunk in indices.chunks(options.mini_batch_size) {
            let mb_inputs = inputs.select(chunk);
            let mb_info = train_info.select(chunk);
            let state = alg.initial_state(chunk.len());

            let step = alg.train_step(&mb_inputs, state, mb_info)?;
            let loss_info = alg.calc_loss(&step.info)?;
            alg.update_with_gradient(&loss_info)?;

            loss_sum += loss_info.scalar()?;
            for (key, value) in &loss_info.extra {
                *stats.extra.entry(key.clone()).or_insert(0.0) += *value;
            }
            stats.minibatches += 1;
        }
    }

    if stats.minibatches > 0 {
        let n = stats.minibatches as f32;
        stats.mean_loss = loss_sum / n;
        for value in stats.extra.values_mut() {
            *value /= n;
        }
    }

    if options.clear_replay_buffer {
        alg.replay_buffer_mut().clear();
    }
    if let Some(counter) = counter {
        counter.increment();
    }

    log::debug!(
        "Replay training: {} rows, {} minibatches, mean loss {:.4}",
        stats.rows,
        stats.minibatches,
        stats.mean_loss
    );
    Ok(stats)
}
