//! Minimal on-policy training driver.
//!
//! - [`RlAlgorithm`]: hooks an algorithm exposes to the driver
//! - [`train_from_replay_buffer`]: one replay training pass
//! - [`Trainer`]: rollout / train / after-iteration loop over a [`VectorizedEnv`]

pub mod algorithm;
pub mod config;
pub mod driver;
pub mod replay_training;


pub use algorithm::RlAlgorithm;
pub use config::TrainerConfig;
pub use driver::{IterationStats, ResetMask, StepResult, Trainer, VectorizedEnv};
pub use replay_training::{train_from_replay_buffer, ReplayTrainingOptions, ReplayTrainingStats};
