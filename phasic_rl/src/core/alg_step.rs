//! Records flowing between the training driver and the algorithm hooks.
//!
//! ```text
//! rollout_step ──► RolloutInfo ──► Experience (replay)
//!                                       │
//!                 preprocess_experience ▼
//!                 TrainInfo { targets + absorbed RolloutInfo }
//!                                       │
//!                 train_step            ▼  absorbs train-time RolloutInfo
//!                 calc_loss ──► LossInfo
//! ```

use std::collections::BTreeMap;

use burn::tensor::{backend::Backend, Tensor};

use super::tensors::to_scalar;
use super::time_step::{row_indices, StepType};
use crate::error::Result;

// ============================================================================
// AlgStep
// ============================================================================

/// Output of a single algorithm step.
#[derive(Debug, Clone)]
pub struct AlgStep<I, S> {
    /// Chosen action per row.
    pub output: Vec<u32>,
    /// Recurrent state after the step.
    pub state: S,
    /// Info record consumed downstream.
    pub info: I,
}

impl<I, S> AlgStep<I, S> {
    /// Replace the info record, keeping output and state.
    pub fn map_info<J>(self, f: impl FnOnce(I) -> J) -> AlgStep<J, S> {
        AlgStep {
            output: self.output,
            state: self.state,
            info: f(self.info),
        }
    }
}

// ============================================================================
// RolloutInfo
// ============================================================================

/// Everything a network evaluation produces for one batch of steps.
#[derive(Debug, Clone)]
pub struct RolloutInfo<B: Backend> {
    /// Action distribution parameters (logits): [batch, n_actions]
    pub action_distribution: Tensor<B, 2>,
    /// Sampled action. Plain integers, so never part of the autodiff graph.
    pub action: Vec<u32>,
    /// Value estimate: [batch]
    pub value: Tensor<B, 1>,
    /// Auxiliary value estimate: [batch]
    pub aux: Tensor<B, 1>,
    /// Step metadata copied from the input time step.
    pub step_type: Vec<StepType>,
    pub discount: Vec<f32>,
    pub reward: Vec<f32>,
}

impl<B: Backend> RolloutInfo<B> {
    /// Number of rows.
    pub fn batch_size(&self) -> usize {
        self.action.len()
    }

    /// Cut every tensor out of the autodiff graph.
    pub fn detach(self) -> Self {
        Self {
            action_distribution: self.action_distribution.detach(),
            value: self.value.detach(),
            aux: self.aux.detach(),
            ..self
        }
    }

    /// Select a subset of rows.
    pub fn select(&self, rows: &[usize]) -> Self {
        let indices = row_indices::<B>(rows, &self.value.device());
        Self {
            action_distribution: self.action_distribution.clone().select(0, indices.clone()),
            action: rows.iter().map(|&r| self.action[r]).collect(),
            value: self.value.clone().select(0, indices.clone()),
            aux: self.aux.clone().select(0, indices),
            step_type: rows.iter().map(|&r| self.step_type[r]).collect(),
            discount: rows.iter().map(|&r| self.discount[r]).collect(),
            reward: rows.iter().map(|&r| self.reward[r]).collect(),
        }
    }
}

// ============================================================================
// TrainInfo
// ============================================================================

/// Self-contained per-step training record.
///
/// Holds the rollout-time action and distribution, the advantage and return
/// targets, and the most recently absorbed evaluation (rollout-time after
/// preprocessing, train-time after `train_step`).
#[derive(Debug, Clone)]
pub struct TrainInfo<B: Backend> {
    /// Action taken during rollout.
    pub action: Vec<u32>,
    /// Action distribution at rollout time (detached).
    pub rollout_action_distribution: Tensor<B, 2>,
    /// Return targets: [batch]
    pub returns: Tensor<B, 1>,
    /// Advantage estimates: [batch]
    pub advantages: Tensor<B, 1>,
    /// Absorbed evaluation.
    pub action_distribution: Tensor<B, 2>,
    pub value: Tensor<B, 1>,
    pub aux: Tensor<B, 1>,
    pub step_type: Vec<StepType>,
    pub discount: Vec<f32>,
    pub reward: Vec<f32>,
}

impl<B: Backend> TrainInfo<B> {
    /// Build a record from computed targets, absorbing the rollout evaluation.
    pub fn from_rollout(
        rollout_info: RolloutInfo<B>,
        returns: Tensor<B, 1>,
        advantages: Tensor<B, 1>,
    ) -> Self {
        let rollout_info = rollout_info.detach();
        Self {
            action: rollout_info.action,
            rollout_action_distribution: rollout_info.action_distribution.clone(),
            returns,
            advantages,
            action_distribution: rollout_info.action_distribution,
            value: rollout_info.value,
            aux: rollout_info.aux,
            step_type: rollout_info.step_type,
            discount: rollout_info.discount,
            reward: rollout_info.reward,
        }
    }

    /// Merge a newer evaluation into this record.
    ///
    /// Replaces the distribution, value, aux and step metadata. The rollout
    /// action, rollout distribution and targets are kept.
    pub fn absorbed(self, info: RolloutInfo<B>) -> Self {
        Self {
            action_distribution: info.action_distribution,
            value: info.value,
            aux: info.aux,
            step_type: info.step_type,
            discount: info.discount,
            reward: info.reward,
            ..self
        }
    }

    /// Number of rows.
    pub fn batch_size(&self) -> usize {
        self.action.len()
    }

    /// Select a subset of rows.
    pub fn select(&self, rows: &[usize]) -> Self {
        let indices = row_indices::<B>(rows, &self.returns.device());
        let pick = |t: &Tensor<B, 1>| t.clone().select(0, indices.clone());
        Self {
            action: rows.iter().map(|&r| self.action[r]).collect(),
            rollout_action_distribution: self
                .rollout_action_distribution
                .clone()
                .select(0, indices.clone()),
            returns: pick(&self.returns),
            advantages: pick(&self.advantages),
            action_distribution: self.action_distribution.clone().select(0, indices.clone()),
            value: pick(&self.value),
            aux: pick(&self.aux),
            step_type: rows.iter().map(|&r| self.step_type[r]).collect(),
            discount: rows.iter().map(|&r| self.discount[r]).collect(),
            reward: rows.iter().map(|&r| self.reward[r]).collect(),
        }
    }
}

// ============================================================================
// LossInfo
// ============================================================================

/// Scalar loss plus named diagnostics.
#[derive(Debug, Clone)]
pub struct LossInfo<B: Backend> {
    /// Scalar loss (1-element tensor) to backpropagate.
    pub loss: Tensor<B, 1>,
    /// Detached diagnostics keyed by name.
    pub extra: BTreeMap<String, f32>,
}

impl<B: Backend> LossInfo<B> {
    /// Create a loss record with no diagnostics.
    pub fn new(loss: Tensor<B, 1>) -> Self {
        Self {
            loss,
            extra: BTreeMap::new(),
        }
    }

    /// Attach a diagnostic value.
    pub fn with_extra(mut self, key: impl Into<String>, value: f32) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Detached scalar value of the loss.
    pub fn scalar(&self) -> Result<f32> {
        to_scalar(self.loss.clone().detach())
    }
}
