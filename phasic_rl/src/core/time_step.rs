//! Environment time steps as seen by the algorithm hooks.

use burn::tensor::{backend::Backend, Int, Tensor};
use serde::{Deserialize, Serialize};

/// Position of a time step inside an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    /// First step of an episode (no reward yet).
    First,
    /// Any intermediate step.
    Mid,
    /// Terminal step of an episode.
    Last,
}

impl StepType {
    /// Whether this step ends an episode.
    #[inline]
    pub fn is_last(self) -> bool {
        matches!(self, StepType::Last)
    }
}

impl Default for StepType {
    fn default() -> Self {
        StepType::Mid
    }
}

/// A batch of environment time steps, one row per environment.
#[derive(Debug, Clone)]
pub struct TimeStep<B: Backend> {
    /// Observations: [batch, obs_size]
    pub observation: Tensor<B, 2>,
    /// Step type per row.
    pub step_type: Vec<StepType>,
    /// Reward received on arrival at this step.
    pub reward: Vec<f32>,
    /// Environment discount for this step (0 at true terminals).
    pub discount: Vec<f32>,
    /// Raw observation payload before any transformation.
    ///
    /// Never stored in the auxiliary replay buffer.
    pub untransformed: Option<Tensor<B, 2>>,
}

impl<B: Backend> TimeStep<B> {
    /// Create a time step batch with no untransformed payload.
    pub fn new(
        observation: Tensor<B, 2>,
        step_type: Vec<StepType>,
        reward: Vec<f32>,
        discount: Vec<f32>,
    ) -> Self {
        Self {
            observation,
            step_type,
            reward,
            discount,
            untransformed: None,
        }
    }

    /// Attach a raw observation payload.
    pub fn with_untransformed(mut self, untransformed: Tensor<B, 2>) -> Self {
        self.untransformed = Some(untransformed);
        self
    }

    /// Drop the raw observation payload.
    pub fn without_untransformed(mut self) -> Self {
        self.untransformed = None;
        self
    }

    /// Number of rows in the batch.
    pub fn batch_size(&self) -> usize {
        self.step_type.len()
    }

    /// Observation feature size.
    pub fn observation_size(&self) -> usize {
        self.observation.dims()[1]
    }

    /// Select a subset of rows.
    pub fn select(&self, rows: &[usize]) -> Self {
        let indices = row_indices::<B>(rows, &self.observation.device());
        Self {
            observation: self.observation.clone().select(0, indices.clone()),
            step_type: rows.iter().map(|&r| self.step_type[r]).collect(),
            reward: rows.iter().map(|&r| self.reward[r]).collect(),
            discount: rows.iter().map(|&r| self.discount[r]).collect(),
            untransformed: self
                .untransformed
                .as_ref()
                .map(|u| u.clone().select(0, indices)),
        }
    }
}

/// Build an index tensor for `Tensor::select` along the batch dimension.
pub(crate) fn row_indices<B: Backend>(rows: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    let rows: Vec<i32> = rows.iter().map(|&r| r as i32).collect();
    Tensor::<B, 1, Int>::from_ints(rows.as_slice(), device)
}
