//! Core data types shared by the algorithm, replay and trainer modules.

pub mod alg_step;
pub mod experience;
pub mod global_counter;
pub mod param_sync;
pub mod tensors;
pub mod time_step;

pub use alg_step::{AlgStep, LossInfo, RolloutInfo, TrainInfo};
pub use experience::{BatchInfo, Experience, ExperienceBatch, ExperienceSpec};
pub use global_counter::{GlobalCounter, TrainingProgress};
pub use param_sync::{copy_parameters, ensure_same_structure, fork_parameters, parameter_values};
pub use time_step::{StepType, TimeStep};
