//! Per-phase bundle of network, optimizer, loss and replay buffer.

use std::fmt;

use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use rand::Rng;

use crate::algorithms::distribution::{select_actions, Exploration};
use crate::algorithms::loss::PhaseLoss;
use crate::algorithms::network::{NetworkOutput, PolicyValueNetwork};
use crate::core::{copy_parameters, AlgStep, RolloutInfo, TimeStep, TrainingProgress};
use crate::error::Result;
use crate::replay::OnetimeReplayBuffer;
use crate::scheduling::ScheduledValue;

// ============================================================================
// Phase / BufferSlot
// ============================================================================

/// Training phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Policy,
    Auxiliary,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Policy => write!(f, "policy"),
            Phase::Auxiliary => write!(f, "auxiliary"),
        }
    }
}

/// Which replay buffer the training driver currently sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferSlot {
    /// The buffer filled by the driver during rollout.
    Shared,
    /// The buffer owned by a phase context.
    Context(Phase),
}

// ============================================================================
// OptimizerRegistry
// ============================================================================

/// Token for a registered optimizer. Orders optimizers by registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptimizerHandle(usize);

impl OptimizerHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Names of every optimizer stepped by `update_with_gradient`.
#[derive(Debug, Clone, Default)]
pub struct OptimizerRegistry {
    names: Vec<String>,
}

impl OptimizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an optimizer and return its handle.
    pub fn register(&mut self, name: impl Into<String>) -> OptimizerHandle {
        self.names.push(name.into());
        OptimizerHandle(self.names.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, handle: OptimizerHandle) -> Option<&str> {
        self.names.get(handle.0).map(String::as_str)
    }
}

// ============================================================================
// PhaseContext
// ============================================================================

/// Everything one phase trains with.
pub struct PhaseContext<B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    phase: Phase,
    network: N,
    optimizer: O,
    optimizer_handle: OptimizerHandle,
    loss: Box<dyn PhaseLoss<B>>,
    replay_buffer: Option<OnetimeReplayBuffer>,
    learning_rate: ScheduledValue,
}

impl<B, N, O> PhaseContext<B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    /// Create a context, registering its optimizer with `registry`.
    pub fn new(
        phase: Phase,
        network: N,
        optimizer: O,
        loss: Box<dyn PhaseLoss<B>>,
        replay_buffer: Option<OnetimeReplayBuffer>,
        learning_rate: ScheduledValue,
        registry: &mut OptimizerRegistry,
    ) -> Self {
        let optimizer_handle = registry.register(format!("{}_optimizer", phase));
        Self {
            phase,
            network,
            optimizer,
            optimizer_handle,
            loss,
            replay_buffer,
            learning_rate,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn loss(&self) -> &dyn PhaseLoss<B> {
        self.loss.as_ref()
    }

    pub fn optimizer_handle(&self) -> OptimizerHandle {
        self.optimizer_handle
    }

    pub fn replay_buffer(&self) -> Option<&OnetimeReplayBuffer> {
        self.replay_buffer.as_ref()
    }

    pub fn replay_buffer_mut(&mut self) -> Option<&mut OnetimeReplayBuffer> {
        self.replay_buffer.as_mut()
    }

    /// Slot the driver sees while this phase is active.
    pub fn buffer_slot(&self) -> BufferSlot {
        match self.replay_buffer {
            Some(_) => BufferSlot::Context(self.phase),
            None => BufferSlot::Shared,
        }
    }

    pub fn set_learning_rate(&mut self, learning_rate: ScheduledValue) {
        self.learning_rate = learning_rate;
    }

    /// Learning rate at the given progress.
    pub fn learning_rate(&self, progress: &TrainingProgress) -> f64 {
        self.learning_rate.value(progress)
    }

    /// Replace the network parameters wholesale.
    pub(crate) fn set_network(&mut self, network: N) {
        self.network = network;
    }

    /// Run the network and choose an action per row.
    pub fn network_forward<R: Rng>(
        &self,
        inputs: &TimeStep<B>,
        state: N::State,
        exploration: Exploration,
        rng: &mut R,
    ) -> Result<AlgStep<RolloutInfo<B>, N::State>> {
        let (output, state) = self.network.forward(inputs.observation.clone(), state);
        let action = select_actions(&output.logits, exploration, rng)?;
        Ok(AlgStep {
            output: action.clone(),
            state,
            info: rollout_info(output, action, inputs),
        })
    }

    /// Re-evaluate the network on replayed inputs, keeping the replayed actions.
    pub fn evaluate(
        &self,
        inputs: &TimeStep<B>,
        state: N::State,
        actions: &[u32],
    ) -> AlgStep<RolloutInfo<B>, N::State> {
        let (output, state) = self.network.forward(inputs.observation.clone(), state);
        AlgStep {
            output: actions.to_vec(),
            state,
            info: rollout_info(output, actions.to_vec(), inputs),
        }
    }

    /// Copy every parameter value of `other`'s network into this one.
    ///
    /// This network keeps its parameter ids, so its optimizer state stays
    /// bound to it.
    pub fn resync_from(&mut self, other: &Self) -> Result<()> {
        self.network = copy_parameters::<B, _>(&other.network, self.network.clone())?;
        Ok(())
    }

    /// Step this context's optimizer with its share of `grads`.
    ///
    /// Returns the number of parameters updated; zero means the network took
    /// no part in the loss and nothing was stepped.
    pub fn apply_gradients(&mut self, grads: &mut B::Gradients, progress: &TrainingProgress) -> usize {
        let params = GradientsParams::from_module(grads, &self.network);
        if params.is_empty() {
            return 0;
        }
        let updated = params.len();
        let lr = self.learning_rate.value(progress);
        self.network = self.optimizer.step(lr, self.network.clone(), params);
        updated
    }
}

impl<B, N, O> fmt::Debug for PhaseContext<B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseContext")
            .field("phase", &self.phase)
            .field("optimizer_handle", &self.optimizer_handle)
            .field("loss", &self.loss.name())
            .field("replay_buffer", &self.replay_buffer.as_ref().map(|b| b.name()))
            .finish()
    }
}

fn rollout_info<B: AutodiffBackend>(
    output: NetworkOutput<B>,
    action: Vec<u32>,
    inputs: &TimeStep<B>,
) -> RolloutInfo<B> {
    RolloutInfo {
        action_distribution: output.logits,
        action,
        value: output.value,
        aux: output.aux,
        step_type: inputs.step_type.clone(),
        discount: inputs.discount.clone(),
        reward: inputs.reward.clone(),
    }
}
