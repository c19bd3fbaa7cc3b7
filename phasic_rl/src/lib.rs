//! # Phasic RL: Phasic Policy Gradient on burn
//!
//! Trains a policy and a value function in two alternating phases over two
//! parameter-disjoint copies of the same network.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Trainer loop                            │
//! │  rollout_step ─► shared buffer ─► train_from_replay_buffer       │
//! │        │                              │          (counter += 1)  │
//! │        ▼                              ▼                          │
//! │   aux buffer                    after_train_iter                 │
//! │        │                              │ counter % interval == 0  │
//! │        │            ┌─────────────────▼─────────────────┐        │
//! │        │            │ AuxPhaseGuard                     │        │
//! │        │            │  aux ◄─resync─ policy             │        │
//! │        └───────────►│  train aux network on aux buffer  │        │
//! │                     │  policy ◄─resync─ aux  (on drop)  │        │
//! │                     └───────────────────────────────────┘        │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use phasic_rl::{PpgAlgorithm, PpgConfig, PolicyValueNetConfig, Trainer, TrainerConfig};
//!
//! let trainer_config = TrainerConfig::new().with_num_iterations(100);
//! let config = PpgConfig::new()
//!     .with_aux_phase_interval(16)
//!     .inherit_trainer_defaults(&trainer_config);
//!
//! let network = PolicyValueNetConfig::new(obs_size, n_actions).init::<B>(&device)?;
//! let mut alg = PpgAlgorithm::new(
//!     config,
//!     network,
//!     AdamConfig::new().init(),
//!     AdamConfig::new().init(),
//!     device,
//! )?;
//!
//! let mut trainer = Trainer::new(trainer_config, 42)?;
//! trainer.run::<B, _, _, _>(&mut alg, &mut env, |stats, alg| Ok(()))?;
//! ```

pub mod algorithms;
pub mod checkpoint;
pub mod core;
pub mod error;
pub mod ppg;
pub mod replay;
pub mod scheduling;
pub mod trainer;

pub use error::{PhasicError, Result};

pub use crate::core::{
    AlgStep, BatchInfo, Experience, ExperienceBatch, ExperienceSpec, GlobalCounter, LossInfo,
    RolloutInfo, StepType, TimeStep, TrainInfo, TrainingProgress,
};

pub use algorithms::{
    AuxPhaseLossConfig, DisjointPolicyValueNet, Exploration, PhaseLoss, PolicyValueNetConfig,
    PolicyValueNetwork, PpoLossConfig, TdLossFn,
};

pub use ppg::{
    AdvantageSource, AuxPhaseOptions, AuxPhaseStats, BufferSlot, Phase, PpgAlgorithm, PpgConfig,
};

pub use replay::{OnetimeReplayBuffer, ReplayBuffer, ReplayBufferConfig};

pub use scheduling::{as_scheduler, ProgressType, ScheduledValue, Scheduler};

pub use trainer::{
    train_from_replay_buffer, IterationStats, ReplayTrainingOptions, RlAlgorithm, StepResult,
    ResetMask, Trainer, TrainerConfig, VectorizedEnv,
};

pub use checkpoint::{Checkpointer, CheckpointerConfig};
