//! Replayable experience records.
//!
//! An [`Experience`] is the lightweight, tensor-free copy of one rollout step
//! (all environments at once) kept for later replay. It carries the
//! observation and rollout info only: the untransformed observation payload
//! and the recurrent state are never stored.

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use super::alg_step::RolloutInfo;
use super::tensors::{tensor_1d, tensor_2d, to_vec};
use super::time_step::{StepType, TimeStep};
use crate::error::{PhasicError, Result};

/// Structural shape of an experience record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperienceSpec {
    /// Number of environments per step.
    pub batch_size: usize,
    /// Observation feature size.
    pub observation_size: usize,
    /// Number of discrete actions.
    pub num_actions: usize,
}

impl std::fmt::Display for ExperienceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch={} obs={} actions={}",
            self.batch_size, self.observation_size, self.num_actions
        )
    }
}

impl ExperienceSpec {
    /// Fail unless `other` matches this spec.
    pub fn ensure_matches(&self, other: &ExperienceSpec) -> Result<()> {
        if self == other {
            Ok(())
        } else {
            Err(PhasicError::ExperienceSpecMismatch {
                expected: self.to_string(),
                got: other.to_string(),
            })
        }
    }
}

/// One rollout step for every environment, as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    /// Observations: [batch * obs_size]
    pub observation: Vec<f32>,
    pub step_type: Vec<StepType>,
    pub reward: Vec<f32>,
    pub discount: Vec<f32>,
    pub action: Vec<u32>,
    /// Action distribution parameters: [batch * n_actions]
    pub action_distribution: Vec<f32>,
    pub value: Vec<f32>,
    pub aux: Vec<f32>,
    spec: ExperienceSpec,
}

impl Experience {
    /// Make an experience from a time step and the rollout info produced for it.
    pub fn from_rollout<B: Backend>(time_step: &TimeStep<B>, info: &RolloutInfo<B>) -> Result<Self> {
        let [batch_size, observation_size] = time_step.observation.dims();
        let [dist_rows, num_actions] = info.action_distribution.dims();
        if dist_rows != batch_size || info.batch_size() != batch_size {
            return Err(PhasicError::ExperienceSpecMismatch {
                expected: format!("{} rows", batch_size),
                got: format!("{} rows", info.batch_size()),
            });
        }

        Ok(Self {
            observation: to_vec(time_step.observation.clone())?,
            step_type: time_step.step_type.clone(),
            reward: time_step.reward.clone(),
            discount: time_step.discount.clone(),
            action: info.action.clone(),
            action_distribution: to_vec(info.action_distribution.clone().detach())?,
            value: to_vec(info.value.clone().detach())?,
            aux: to_vec(info.aux.clone().detach())?,
            spec: ExperienceSpec {
                batch_size,
                observation_size,
                num_actions,
            },
        })
    }

    /// Structural shape of this record.
    pub fn spec(&self) -> ExperienceSpec {
        self.spec
    }
}

/// Batch layout handed to `preprocess_experience`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInfo {
    /// Number of sequences (environments).
    pub batch_size: usize,
    /// Time steps per sequence.
    pub length: usize,
}

impl BatchInfo {
    /// Total number of rows (`batch_size * length`).
    pub fn rows(&self) -> usize {
        self.batch_size * self.length
    }
}

/// Time-ordered experiences gathered from a replay buffer.
///
/// Converted to tensors batch-major: row `b * length + t` holds environment
/// `b` at time `t`.
#[derive(Debug, Clone)]
pub struct ExperienceBatch {
    spec: ExperienceSpec,
    steps: Vec<Experience>,
}

impl ExperienceBatch {
    /// Wrap time-ordered experiences sharing `spec`.
    pub fn new(spec: ExperienceSpec, steps: Vec<Experience>) -> Self {
        Self { spec, steps }
    }

    /// Structural shape of each step.
    pub fn spec(&self) -> ExperienceSpec {
        self.spec
    }

    /// Batch layout of the gathered data.
    pub fn batch_info(&self) -> BatchInfo {
        BatchInfo {
            batch_size: self.spec.batch_size,
            length: self.steps.len(),
        }
    }

    /// Convert to batch-major tensors.
    pub fn into_tensors<B: Backend>(self, device: &B::Device) -> (TimeStep<B>, RolloutInfo<B>) {
        let ExperienceSpec {
            batch_size,
            observation_size,
            num_actions,
        } = self.spec;
        let length = self.steps.len();
        let rows = batch_size * length;

        let mut observation = Vec::with_capacity(rows * observation_size);
        let mut distribution = Vec::with_capacity(rows * num_actions);
        let mut step_type = Vec::with_capacity(rows);
        let mut reward = Vec::with_capacity(rows);
        let mut discount = Vec::with_capacity(rows);
        let mut action = Vec::with_capacity(rows);
        let mut value = Vec::with_capacity(rows);
        let mut aux = Vec::with_capacity(rows);

        for b in 0..batch_size {
            for step in &self.steps {
                observation.extend_from_slice(
                    &step.observation[b * observation_size..(b + 1) * observation_size],
                );
                distribution
                    .extend_from_slice(&step.action_distribution[b * num_actions..(b + 1) * num_actions]);
                step_type.push(step.step_type[b]);
                reward.push(step.reward[b]);
                discount.push(step.discount[b]);
                action.push(step.action[b]);
                value.push(step.value[b]);
                aux.push(step.aux[b]);
            }
        }

        let time_step = TimeStep::new(
            tensor_2d(observation, rows, observation_size, device),
            step_type.clone(),
            reward.clone(),
            discount.clone(),
        );
        let info = RolloutInfo {
            action_distribution: tensor_2d(distribution, rows, num_actions, device),
            action,
            value: tensor_1d(&value, device),
            aux: tensor_1d(&aux, device),
            step_type,
            discount,
            reward,
        };
        (time_step, info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Tensor;

    type B = NdArray<f32>;

    fn make(t: f32) -> Experience {
        let device = Default::default();
        let step = TimeStep::<B>::new(
            Tensor::<B, 1>::from_floats([t, t, 10.0 + t, 10.0 + t], &device).reshape([2, 2]),
            vec![StepType::Mid; 2],
            vec![t, 10.0 + t],
            vec![1.0, 1.0],
        )
        .with_untransformed(Tensor::zeros([2, 2], &device));
        let info = RolloutInfo {
            action_distribution: Tensor::zeros([2, 3], &device),
            action: vec![0, 2],
            value: Tensor::from_floats([t, 10.0 + t], &device),
            aux: Tensor::from_floats([t, 10.0 + t], &device),
            step_type: step.step_type.clone(),
            discount: step.discount.clone(),
            reward: step.reward.clone(),
        };
        Experience::from_rollout(&step, &info).unwrap()
    }

    #[test]
    fn test_experience_spec_from_first_rollout() {
        let exp = make(0.0);
        assert_eq!(
            exp.spec(),
            ExperienceSpec {
                batch_size: 2,
                observation_size: 2,
                num_actions: 3
            }
        );
    }

    #[test]
    fn test_spec_mismatch_is_reported() {
        let spec = make(0.0).spec();
        let other = ExperienceSpec {
            num_actions: 4,
            ..spec
        };
        assert!(matches!(
            spec.ensure_matches(&other),
            Err(PhasicError::ExperienceSpecMismatch { .. })
        ));
    }

    #[test]
    fn test_batch_major_layout() {
        let batch = ExperienceBatch::new(make(0.0).spec(), vec![make(0.0), make(1.0), make(2.0)]);
        let info = batch.batch_info();
        assert_eq!(info, BatchInfo { batch_size: 2, length: 3 });

        let (step, rollout) = batch.into_tensors::<B>(&Default::default());
        // Env 0 over time, then env 1 over time
        assert_eq!(step.reward, vec![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]);
        assert_eq!(rollout.action, vec![0, 0, 0, 2, 2, 2]);
        assert!(step.untransformed.is_none());
        assert_eq!(step.observation.dims(), [6, 2]);
    }
}
