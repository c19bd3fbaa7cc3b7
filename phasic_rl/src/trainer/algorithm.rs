//! Hook interface between the training driver and an algorithm.

use std::fmt::Debug;

use burn::tensor::backend::AutodiffBackend;

use super::replay_training::ReplayTrainingOptions;
use crate::core::{
    AlgStep, BatchInfo, Experience, GlobalCounter, LossInfo, RolloutInfo, TimeStep, TrainInfo,
    TrainingProgress,
};
use crate::error::Result;
use crate::replay::ReplayBuffer;

/// An algorithm driven by [`Trainer`](super::Trainer) and
/// [`train_from_replay_buffer`](super::train_from_replay_buffer).
///
/// Hooks are invoked once per iteration in a fixed order: `rollout_step`
/// (per unroll step), `preprocess_experience`, `train_step`, `calc_loss`,
/// `update_with_gradient` (per minibatch), then `after_train_iter`.
pub trait RlAlgorithm<B: AutodiffBackend> {
    /// Recurrent state threaded through rollout and training.
    type State: Clone + Debug;

    /// Initial state for `batch_size` rows.
    fn initial_state(&self, batch_size: usize) -> Self::State;

    /// Device tensors are created on.
    fn device(&self) -> B::Device;

    /// Update the progress snapshot used by hyperparameter schedules.
    fn set_training_progress(&mut self, progress: TrainingProgress);

    /// Choose actions for a rollout step.
    fn rollout_step(
        &mut self,
        inputs: &TimeStep<B>,
        state: Self::State,
    ) -> Result<AlgStep<RolloutInfo<B>, Self::State>>;

    /// Store one rollout step in the visible replay buffer.
    fn observe_for_replay(&mut self, experience: Experience) -> Result<()> {
        self.replay_buffer_mut().observe(experience)
    }

    /// Turn replayed rollout data into self-contained training records.
    fn preprocess_experience(
        &self,
        inputs: TimeStep<B>,
        rollout_info: RolloutInfo<B>,
        batch_info: BatchInfo,
    ) -> Result<(TimeStep<B>, TrainInfo<B>)>;

    /// Re-evaluate a minibatch under the current parameters.
    fn train_step(
        &mut self,
        inputs: &TimeStep<B>,
        state: Self::State,
        prev_train_info: TrainInfo<B>,
    ) -> Result<AlgStep<TrainInfo<B>, Self::State>>;

    /// Compute the loss of a training record.
    fn calc_loss(&self, info: &TrainInfo<B>) -> Result<LossInfo<B>>;

    /// Backpropagate `loss_info` and step every registered optimizer.
    fn update_with_gradient(&mut self, loss_info: &LossInfo<B>) -> Result<()>;

    /// Choose actions for evaluation.
    ///
    /// `epsilon_greedy` overrides the configured exploration default.
    fn predict_step(
        &mut self,
        inputs: &TimeStep<B>,
        state: Self::State,
        epsilon_greedy: Option<f32>,
    ) -> Result<AlgStep<RolloutInfo<B>, Self::State>>;

    /// Called once after each training iteration.
    fn after_train_iter(
        &mut self,
        counter: &GlobalCounter,
        options: &ReplayTrainingOptions,
    ) -> Result<()>;

    /// Replay buffer currently exposed to the driver.
    fn replay_buffer(&self) -> &dyn ReplayBuffer;

    /// Mutable access to the exposed replay buffer.
    fn replay_buffer_mut(&mut self) -> &mut dyn ReplayBuffer;
}
