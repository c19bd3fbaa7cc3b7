//! Phasic Policy Gradient orchestrator.
//!
//! Two structurally identical networks are trained in alternating phases:
//!
//! ```text
//!   POLICY_ACTIVE ──(counter % interval == 0)──► AUX_ACTIVE
//!         ▲                                          │
//!         └──── guard drop: resync policy ◄ aux ─────┘
//! ```
//!
//! The policy phase runs PPO on the shared replay buffer. Every `interval`
//! global counter steps the auxiliary phase trains the auxiliary head and the
//! value head on the auxiliary replay buffer while a KL term keeps the policy
//! close to its rollout-time behavior. The auxiliary phase is entered only
//! through [`PpgAlgorithm::activate_aux_phase`], whose guard restores the
//! policy phase on every exit path, panics included.

use std::ops::{Deref, DerefMut};

use burn::optim::Optimizer;
use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::config::{AdvantageSource, PpgConfig};
use super::context::{BufferSlot, OptimizerRegistry, Phase, PhaseContext};
use super::trigger::AuxPhaseTrigger;
use crate::algorithms::distribution::Exploration;
use crate::algorithms::gae::{extend_with_zero, generalized_advantage_estimation, SequenceLayout};
use crate::algorithms::network::PolicyValueNetwork;
use crate::core::tensors::{tensor_1d, to_vec};
use crate::core::{
    copy_parameters, fork_parameters, AlgStep, BatchInfo, Experience, GlobalCounter, LossInfo,
    RolloutInfo, TimeStep, TrainInfo, TrainingProgress,
};
use crate::error::{PhasicError, Result};
use crate::replay::{OnetimeReplayBuffer, ReplayBuffer};
use crate::scheduling::ScheduledValue;
use crate::trainer::{train_from_replay_buffer, ReplayTrainingOptions, RlAlgorithm};

/// Counters describing auxiliary phase activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuxPhaseStats {
    /// Times the auxiliary phase was entered.
    pub entries: u64,
    /// Counter value of the last trigger.
    pub last_triggered_at: Option<u64>,
    /// Triggers skipped because the auxiliary buffer was empty.
    pub skipped_empty: u64,
    /// Gradient updates applied while the auxiliary phase was active.
    pub updates: u64,
    /// Mean loss of the last auxiliary phase.
    pub last_loss: Option<f32>,
}

// ============================================================================
// PpgAlgorithm
// ============================================================================

/// Phasic Policy Gradient.
pub struct PpgAlgorithm<B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    config: PpgConfig,
    policy: PhaseContext<B, N, O>,
    aux: PhaseContext<B, N, O>,
    shared_buffer: OnetimeReplayBuffer,
    visible_buffer: BufferSlot,
    active: Phase,
    trigger: AuxPhaseTrigger,
    registry: OptimizerRegistry,
    epsilon_greedy: f32,
    rng: StdRng,
    progress: TrainingProgress,
    stats: AuxPhaseStats,
    device: B::Device,
}

impl<B, N, O> PpgAlgorithm<B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    /// Create the algorithm from one network and an optimizer per phase.
    ///
    /// The auxiliary network is a parameter-disjoint fork of `network`.
    pub fn new(
        config: PpgConfig,
        network: N,
        policy_optimizer: O,
        aux_optimizer: O,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;

        let mut registry = OptimizerRegistry::new();
        let aux_network = fork_parameters::<B, _>(&network);

        let policy = PhaseContext::new(
            Phase::Policy,
            network,
            policy_optimizer,
            Box::new(config.policy_loss.clone().init()?),
            None,
            ScheduledValue::from(config.policy_learning_rate),
            &mut registry,
        );
        let aux_buffer =
            OnetimeReplayBuffer::new("aux_replay_buffer", config.aux_phase.replay_buffer.clone())?;
        let aux = PhaseContext::new(
            Phase::Auxiliary,
            aux_network,
            aux_optimizer,
            Box::new(config.aux_loss.clone().init()?),
            Some(aux_buffer),
            ScheduledValue::from(config.aux_learning_rate),
            &mut registry,
        );

        let trigger = AuxPhaseTrigger::new(config.aux_phase.interval)?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let epsilon_greedy = config.effective_epsilon_greedy();
        let visible_buffer = policy.buffer_slot();

        log::info!(
            "PPG: aux phase {} (interval {}), {} optimizers registered",
            if config.aux_phase.enabled { "enabled" } else { "disabled" },
            config.aux_phase.interval,
            registry.len()
        );

        Ok(Self {
            config,
            policy,
            aux,
            shared_buffer: OnetimeReplayBuffer::unbounded("shared_replay_buffer"),
            visible_buffer,
            active: Phase::Policy,
            trigger,
            registry,
            epsilon_greedy,
            rng,
            progress: TrainingProgress::default(),
            stats: AuxPhaseStats::default(),
            device,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn config(&self) -> &PpgConfig {
        &self.config
    }

    pub fn active_phase(&self) -> Phase {
        self.active
    }

    pub fn visible_buffer(&self) -> BufferSlot {
        self.visible_buffer
    }

    /// Network used for rollout and prediction.
    pub fn policy_network(&self) -> &N {
        self.policy.network()
    }

    pub fn aux_network(&self) -> &N {
        self.aux.network()
    }

    pub fn aux_stats(&self) -> &AuxPhaseStats {
        &self.stats
    }

    pub fn optimizers(&self) -> &OptimizerRegistry {
        &self.registry
    }

    pub fn shared_replay_buffer(&self) -> &OnetimeReplayBuffer {
        &self.shared_buffer
    }

    /// Auxiliary replay buffer.
    pub fn aux_replay_buffer(&self) -> Option<&OnetimeReplayBuffer> {
        self.aux.replay_buffer()
    }

    /// Replace a phase's learning rate with a schedule.
    pub fn with_learning_rate_schedule(mut self, phase: Phase, learning_rate: ScheduledValue) -> Self {
        self.context_mut(phase).set_learning_rate(learning_rate);
        self
    }

    /// Load parameter values into the policy network (e.g. from a checkpoint).
    ///
    /// The policy network keeps its parameter ids, so optimizer state stays
    /// bound.
    pub fn restore_policy_parameters(&mut self, source: &N) -> Result<()> {
        let restored = copy_parameters::<B, _>(source, self.policy.network().clone())?;
        self.policy.set_network(restored);
        Ok(())
    }

    fn context(&self, phase: Phase) -> &PhaseContext<B, N, O> {
        match phase {
            Phase::Policy => &self.policy,
            Phase::Auxiliary => &self.aux,
        }
    }

    fn context_mut(&mut self, phase: Phase) -> &mut PhaseContext<B, N, O> {
        match phase {
            Phase::Policy => &mut self.policy,
            Phase::Auxiliary => &mut self.aux,
        }
    }

    fn active_context(&self) -> &PhaseContext<B, N, O> {
        self.context(self.active)
    }

    // ------------------------------------------------------------------------
    // Scoped phase switch
    // ------------------------------------------------------------------------

    /// Enter the auxiliary phase.
    ///
    /// Resyncs the auxiliary network from the policy network and points the
    /// visible replay buffer at the auxiliary buffer. The returned guard
    /// restores the policy phase when dropped; use [`AuxPhaseGuard::finish`]
    /// to observe a failed resync.
    pub fn activate_aux_phase(&mut self) -> Result<AuxPhaseGuard<'_, B, N, O>> {
        if self.active == Phase::Auxiliary {
            return Err(PhasicError::PhaseAlreadyActive);
        }
        self.aux.resync_from(&self.policy)?;

        let previous = self.visible_buffer;
        self.active = Phase::Auxiliary;
        self.visible_buffer = self.aux.buffer_slot();
        self.stats.entries += 1;

        log::debug!(
            "Entering auxiliary phase #{} (visible buffer {:?} -> {:?})",
            self.stats.entries,
            previous,
            self.visible_buffer
        );

        Ok(AuxPhaseGuard {
            alg: self,
            previous,
            released: false,
        })
    }

    /// Run `body` with the auxiliary phase active.
    ///
    /// The policy phase is restored whether `body` succeeds, fails or panics.
    /// An error from `body` takes precedence over a resync error.
    pub fn with_aux_phase_active<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut guard = self.activate_aux_phase()?;
        let result = body(&mut *guard);
        let exit = guard.finish();
        let value = result?;
        exit?;
        Ok(value)
    }

    fn exit_aux_phase(&mut self, previous: BufferSlot) -> Result<()> {
        let resync = self.policy.resync_from(&self.aux);
        self.active = Phase::Policy;
        self.visible_buffer = previous;
        log::debug!("Leaving auxiliary phase (visible buffer {:?})", previous);
        resync
    }

    // ------------------------------------------------------------------------
    // Buffers
    // ------------------------------------------------------------------------

    fn slot_buffer(&self, slot: BufferSlot) -> &OnetimeReplayBuffer {
        match slot {
            BufferSlot::Shared => &self.shared_buffer,
            BufferSlot::Context(phase) => {
                self.context(phase).replay_buffer().unwrap_or(&self.shared_buffer)
            }
        }
    }

    fn slot_buffer_mut(&mut self, slot: BufferSlot) -> &mut OnetimeReplayBuffer {
        let context = match slot {
            BufferSlot::Shared => return &mut self.shared_buffer,
            BufferSlot::Context(Phase::Policy) => &mut self.policy,
            BufferSlot::Context(Phase::Auxiliary) => &mut self.aux,
        };
        match context.replay_buffer_mut() {
            Some(buffer) => buffer,
            None => &mut self.shared_buffer,
        }
    }
}

// ============================================================================
// AuxPhaseGuard
// ============================================================================

/// Keeps the auxiliary phase active until dropped or finished.
///
/// Dereferences to the algorithm so training can run through the guard.
pub struct AuxPhaseGuard<'a, B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    alg: &'a mut PpgAlgorithm<B, N, O>,
    previous: BufferSlot,
    released: bool,
}

impl<B, N, O> AuxPhaseGuard<'_, B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    /// Leave the auxiliary phase, reporting a failed policy resync.
    pub fn finish(mut self) -> Result<()> {
        self.released = true;
        self.alg.exit_aux_phase(self.previous)
    }
}

impl<B, N, O> Drop for AuxPhaseGuard<'_, B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.alg.exit_aux_phase(self.previous) {
            log::error!("Failed to resync policy network on aux phase exit: {}", e);
        }
    }
}

impl<B, N, O> Deref for AuxPhaseGuard<'_, B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    type Target = PpgAlgorithm<B, N, O>;

    fn deref(&self) -> &Self::Target {
        self.alg
    }
}

impl<B, N, O> DerefMut for AuxPhaseGuard<'_, B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.alg
    }
}

// ============================================================================
// RlAlgorithm hooks
// ============================================================================

impl<B, N, O> RlAlgorithm<B> for PpgAlgorithm<B, N, O>
where
    B: AutodiffBackend,
    N: PolicyValueNetwork<B>,
    O: Optimizer<N, B>,
{
    type State = N::State;

    fn initial_state(&self, batch_size: usize) -> Self::State {
        self.policy.network().initial_state(batch_size)
    }

    fn device(&self) -> B::Device {
        self.device.clone()
    }

    fn set_training_progress(&mut self, progress: TrainingProgress) {
        self.progress = progress;
    }

    fn rollout_step(
        &mut self,
        inputs: &TimeStep<B>,
        state: Self::State,
    ) -> Result<AlgStep<RolloutInfo<B>, Self::State>> {
        let step = self
            .policy
            .network_forward(inputs, state, Exploration::Sample, &mut self.rng)?
            .map_info(RolloutInfo::detach);

        if self.config.aux_phase.enabled {
            if let Some(buffer) = self.aux.replay_buffer_mut() {
                buffer.observe(Experience::from_rollout(inputs, &step.info)?)?;
            }
        }
        Ok(step)
    }

    fn preprocess_experience(
        &self,
        inputs: TimeStep<B>,
        rollout_info: RolloutInfo<B>,
        batch_info: BatchInfo,
    ) -> Result<(TimeStep<B>, TrainInfo<B>)> {
        let loss = match self.config.advantage_source {
            AdvantageSource::PolicyPhase => self.policy.loss(),
            AdvantageSource::ActivePhase => self.active_context().loss(),
        };
        let gamma = loss.gamma();
        let layout = SequenceLayout::batch_major(batch_info.batch_size, batch_info.length);

        let values = to_vec(rollout_info.value.clone())?;
        let discounts: Vec<f32> = rollout_info.discount.iter().map(|d| d * gamma).collect();
        let advantages = generalized_advantage_estimation(
            &rollout_info.reward,
            &values,
            &rollout_info.step_type,
            &discounts,
            loss.td_lambda(),
            layout,
        );
        let advantages = extend_with_zero(&advantages, layout);
        let returns: Vec<f32> = values.iter().zip(&advantages).map(|(v, a)| v + a).collect();

        let device = rollout_info.value.device();
        let info = TrainInfo::from_rollout(
            rollout_info,
            tensor_1d(&returns, &device),
            tensor_1d(&advantages, &device),
        );
        Ok((inputs, info))
    }

    fn train_step(
        &mut self,
        inputs: &TimeStep<B>,
        state: Self::State,
        prev_train_info: TrainInfo<B>,
    ) -> Result<AlgStep<TrainInfo<B>, Self::State>> {
        let step = self
            .active_context()
            .evaluate(inputs, state, &prev_train_info.action);
        Ok(step.map_info(|info| prev_train_info.absorbed(info)))
    }

    fn calc_loss(&self, info: &TrainInfo<B>) -> Result<LossInfo<B>> {
        self.active_context().loss().loss(info)
    }

    fn update_with_gradient(&mut self, loss_info: &LossInfo<B>) -> Result<()> {
        let mut grads = loss_info.loss.backward();
        let progress = self.progress;

        let mut phases = [Phase::Policy, Phase::Auxiliary];
        phases.sort_by_key(|&phase| self.context(phase).optimizer_handle());

        for phase in phases {
            let updated = self.context_mut(phase).apply_gradients(&mut grads, &progress);
            log::trace!("{} optimizer: {} parameters updated", phase, updated);
        }

        if self.active == Phase::Auxiliary {
            self.stats.updates += 1;
        }
        Ok(())
    }

    fn predict_step(
        &mut self,
        inputs: &TimeStep<B>,
        state: Self::State,
        epsilon_greedy: Option<f32>,
    ) -> Result<AlgStep<RolloutInfo<B>, Self::State>> {
        let exploration = Exploration::epsilon_greedy(epsilon_greedy.unwrap_or(self.epsilon_greedy));
        Ok(self
            .policy
            .network_forward(inputs, state, exploration, &mut self.rng)?
            .map_info(RolloutInfo::detach))
    }

    fn after_train_iter(
        &mut self,
        counter: &GlobalCounter,
        options: &ReplayTrainingOptions,
    ) -> Result<()> {
        if !self.config.aux_phase.enabled {
            return Ok(());
        }
        let count = counter.get();
        if !self.trigger.poll(count) {
            return Ok(());
        }
        self.stats.last_triggered_at = Some(count);

        if self.aux.replay_buffer().map_or(true, |b| b.is_empty()) {
            log::warn!("Auxiliary phase due at counter {} but its replay buffer is empty", count);
            self.stats.skipped_empty += 1;
            return Ok(());
        }

        let aux_options = self.config.aux_phase.replay_options(options);
        let mut shuffle_rng = StdRng::seed_from_u64(self.rng.gen());
        let stats = self.with_aux_phase_active(|alg| {
            train_from_replay_buffer::<B, _, _>(alg, &aux_options, None, &mut shuffle_rng)
        })?;
        self.stats.last_loss = Some(stats.mean_loss);

        log::info!(
            "Auxiliary phase at counter {}: {} rows, {} updates, mean loss {:.4}",
            count,
            stats.rows,
            stats.minibatches,
            stats.mean_loss
        );
        Ok(())
    }

    fn replay_buffer(&self) -> &dyn ReplayBuffer {
        self.slot_buffer(self.visible_buffer)
    }

    fn replay_buffer_mut(&mut self) -> &mut dyn ReplayBuffer {
        let slot = self.visible_buffer;
        self.slot_buffer_mut(slot)
    }
}
