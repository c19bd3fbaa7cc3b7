//! Configuration for [`PpgAlgorithm`](super::PpgAlgorithm).

use serde::{Deserialize, Serialize};

use crate::algorithms::loss::{AuxPhaseLossConfig, PpoLossConfig};
use crate::error::{PhasicError, Result};
use crate::replay::ReplayBufferConfig;
use crate::trainer::{ReplayTrainingOptions, TrainerConfig};

/// Default auxiliary phase interval, in global counter steps.
pub const DEFAULT_AUX_PHASE_INTERVAL: u64 = 32;

/// Which phase's loss provides γ and λ for advantage estimation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvantageSource {
    /// Always use the policy phase loss, even while the auxiliary phase runs.
    #[default]
    PolicyPhase,
    /// Use the loss of whichever phase is active.
    ActivePhase,
}

/// Auxiliary phase settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxPhaseOptions {
    /// Run the auxiliary phase at all.
    pub enabled: bool,
    /// Run it whenever the global counter is a multiple of this.
    pub interval: u64,
    /// Minibatch size override (`None` = trainer's).
    pub mini_batch_size: Option<usize>,
    /// Update count override (`None` = trainer's).
    pub num_updates_per_train_iter: Option<usize>,
    /// Auxiliary replay buffer settings.
    pub replay_buffer: ReplayBufferConfig,
}

impl Default for AuxPhaseOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_AUX_PHASE_INTERVAL,
            mini_batch_size: None,
            num_updates_per_train_iter: None,
            replay_buffer: ReplayBufferConfig::default(),
        }
    }
}

impl AuxPhaseOptions {
    /// Replay options for the auxiliary phase, falling back to `base`.
    ///
    /// The auxiliary buffer is always cleared once trained on.
    pub fn replay_options(&self, base: &ReplayTrainingOptions) -> ReplayTrainingOptions {
        ReplayTrainingOptions {
            mini_batch_size: self.mini_batch_size.unwrap_or(base.mini_batch_size),
            num_updates_per_train_iter: self
                .num_updates_per_train_iter
                .unwrap_or(base.num_updates_per_train_iter),
            clear_replay_buffer: true,
        }
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<()> {
        if self.interval == 0 {
            return Err(PhasicError::config("aux_phase interval must be > 0"));
        }
        if self.mini_batch_size == Some(0) {
            return Err(PhasicError::config("aux_phase mini_batch_size must be > 0"));
        }
        if self.num_updates_per_train_iter == Some(0) {
            return Err(PhasicError::config(
                "aux_phase num_updates_per_train_iter must be > 0",
            ));
        }
        self.replay_buffer.validate()
    }
}

/// PPG algorithm configuration.
///
/// # Example
///
/// ```ignore
/// let config = PpgConfig::new()
///     .with_aux_phase_interval(16)
///     .with_policy_learning_rate(3e-4)
///     .inherit_trainer_defaults(&trainer_config);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpgConfig {
    pub aux_phase: AuxPhaseOptions,
    pub policy_loss: PpoLossConfig,
    pub aux_loss: AuxPhaseLossConfig,
    pub advantage_source: AdvantageSource,
    /// Exploration for `predict_step` (`None` = inherit from the trainer).
    pub epsilon_greedy: Option<f32>,
    pub policy_learning_rate: f64,
    pub aux_learning_rate: f64,
    /// Seed for action sampling (`None` = from entropy).
    pub seed: Option<u64>,
}

impl Default for PpgConfig {
    fn default() -> Self {
        Self {
            aux_phase: AuxPhaseOptions::default(),
            policy_loss: PpoLossConfig::default(),
            aux_loss: AuxPhaseLossConfig::default(),
            advantage_source: AdvantageSource::default(),
            epsilon_greedy: None,
            policy_learning_rate: 1e-3,
            aux_learning_rate: 1e-3,
            seed: None,
        }
    }
}

impl PpgConfig {
    /// Fallback exploration when neither config nor trainer sets one.
    pub const DEFAULT_EPSILON_GREEDY: f32 = 0.1;

    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aux_phase(mut self, aux_phase: AuxPhaseOptions) -> Self {
        self.aux_phase = aux_phase;
        self
    }

    pub fn with_aux_phase_enabled(mut self, enabled: bool) -> Self {
        self.aux_phase.enabled = enabled;
        self
    }

    pub fn with_aux_phase_interval(mut self, interval: u64) -> Self {
        self.aux_phase.interval = interval;
        self
    }

    pub fn with_policy_loss(mut self, loss: PpoLossConfig) -> Self {
        self.policy_loss = loss;
        self
    }

    pub fn with_aux_loss(mut self, loss: AuxPhaseLossConfig) -> Self {
        self.aux_loss = loss;
        self
    }

    pub fn with_advantage_source(mut self, source: AdvantageSource) -> Self {
        self.advantage_source = source;
        self
    }

    pub fn with_epsilon_greedy(mut self, epsilon: f32) -> Self {
        self.epsilon_greedy = Some(epsilon);
        self
    }

    pub fn with_policy_learning_rate(mut self, lr: f64) -> Self {
        self.policy_learning_rate = lr;
        self
    }

    pub fn with_aux_learning_rate(mut self, lr: f64) -> Self {
        self.aux_learning_rate = lr;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Fill unset values from the trainer configuration.
    pub fn inherit_trainer_defaults(mut self, trainer: &TrainerConfig) -> Self {
        if self.epsilon_greedy.is_none() {
            self.epsilon_greedy = Some(trainer.epsilon_greedy);
        }
        self
    }

    /// Exploration rate used by `predict_step` when the caller passes none.
    pub fn effective_epsilon_greedy(&self) -> f32 {
        self.epsilon_greedy.unwrap_or(Self::DEFAULT_EPSILON_GREEDY)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.aux_phase.validate()?;
        self.policy_loss.validate()?;
        self.aux_loss.validate()?;
        if let Some(eps) = self.epsilon_greedy {
            if !(0.0..=1.0).contains(&eps) {
                return Err(PhasicError::config(format!(
                    "epsilon_greedy must be in [0, 1], got {}",
                    eps
                )));
            }
        }
        if self.policy_learning_rate <= 0.0 || self.aux_learning_rate <= 0.0 {
            return Err(PhasicError::config("learning rates must be > 0"));
        }
        Ok(())
    }
}
