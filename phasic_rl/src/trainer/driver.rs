//! Synchronous on-policy training loop.
//!
//! ```text
//! for iteration in 0..num_iterations:
//!     unroll_length × { rollout_step ─► observe_for_replay ─► env.step }
//!     train_from_replay_buffer (advances the global counter)
//!     after_train_iter
//! ```

use burn::tensor::backend::AutodiffBackend;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::algorithm::RlAlgorithm;
use super::config::TrainerConfig;
use super::replay_training::train_from_replay_buffer;
use crate::core::tensors::tensor_2d;
use crate::core::{Experience, GlobalCounter, StepType, TimeStep, TrainingProgress};
use crate::error::{PhasicError, Result};

// ============================================================================
// Environment interface
// ============================================================================

/// Result from stepping vectorized environments.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Observations after step [n_envs * obs_size] (flattened)
    pub observations: Vec<f32>,
    /// Rewards received [n_envs]
    pub rewards: Vec<f32>,
    /// Episode ended due to goal/failure [n_envs]
    pub terminals: Vec<bool>,
    /// Episode ended due to time limit [n_envs]
    pub truncations: Vec<bool>,
}

impl StepResult {
    /// Terminal or truncated, per environment.
    pub fn dones(&self) -> Vec<bool> {
        self.terminals
            .iter()
            .zip(&self.truncations)
            .map(|(&t, &tr)| t || tr)
            .collect()
    }
}

/// Mask of environments that need a reset.
#[derive(Debug, Clone)]
pub struct ResetMask {
    mask: Vec<bool>,
}

impl ResetMask {
    pub fn from_dones(dones: &[bool]) -> Self {
        Self {
            mask: dones.to_vec(),
        }
    }

    pub fn any(&self) -> bool {
        self.mask.iter().any(|&x| x)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.mask
    }

    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&x| x).count()
    }
}

/// Batch of discrete-action environments stepped in lockstep.
///
/// Environments are never reset implicitly: the driver resets those that
/// reported a terminal or truncated step and marks their next step `First`.
pub trait VectorizedEnv {
    /// Number of parallel environments.
    fn n_envs(&self) -> usize;

    /// Size of observation vector for single environment.
    fn obs_size(&self) -> usize;

    /// Number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Write current observations to buffer ([n_envs * obs_size]).
    fn write_observations(&self, buffer: &mut [f32]);

    /// Step all environments with one action each.
    fn step(&mut self, actions: &[u32]) -> StepResult;

    /// Reset the environments selected by `mask`.
    fn reset_envs(&mut self, mask: &ResetMask, seed: u64);

    /// Reset all environments.
    fn reset_all(&mut self, seed: u64);

    /// Current observations as a new vector.
    fn get_observations(&self) -> Vec<f32> {
        let mut buffer = vec![0.0f32; self.n_envs() * self.obs_size()];
        self.write_observations(&mut buffer);
        buffer
    }
}

// ============================================================================
// Trainer
// ============================================================================

/// Per-iteration training summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationStats {
    pub iteration: usize,
    pub global_counter: u64,
    pub env_steps: u64,
    /// Mean loss of the policy-phase replay training.
    pub mean_loss: f32,
    /// Episodes finished during this iteration's rollout.
    pub episodes: usize,
    /// Mean undiscounted return of those episodes.
    pub mean_episode_return: Option<f32>,
}

/// Drives rollout, replay training and `after_train_iter` for an algorithm.
#[derive(Debug)]
pub struct Trainer {
    config: TrainerConfig,
    counter: GlobalCounter,
    env_steps: u64,
    seed: u64,
    rng: StdRng,
}

impl Trainer {
    /// Create a trainer. `seed` drives environment resets and minibatch
    /// shuffling.
    pub fn new(config: TrainerConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            counter: GlobalCounter::new(),
            env_steps: 0,
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Continue counting from `counter`, e.g. the step of a restored checkpoint.
    pub fn with_global_counter(mut self, counter: u64) -> Self {
        self.counter = GlobalCounter::starting_at(counter);
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn global_counter(&self) -> GlobalCounter {
        self.counter
    }

    pub fn env_steps(&self) -> u64 {
        self.env_steps
    }

    /// Run `num_iterations` iterations.
    ///
    /// `on_iteration` runs after each iteration's `after_train_iter`; an error
    /// from it stops training.
    pub fn run<B, A, E, F>(&mut self, alg: &mut A, env: &mut E, mut on_iteration: F) -> Result<Vec<IterationStats>>
    where
        B: AutodiffBackend,
        A: RlAlgorithm<B>,
        E: VectorizedEnv,
        F: FnMut(&IterationStats, &A) -> Result<()>,
    {
        let n_envs = env.n_envs();
        let obs_size = env.obs_size();
        if n_envs == 0 || obs_size == 0 {
            return Err(PhasicError::config("environment must have envs and observations"));
        }

        let device = alg.device();
        let options = self.config.replay_options();
        let total = self.config.num_iterations as u64;

        env.reset_all(self.seed);
        let mut reset_count = 1u64;
        let mut step_type = vec![StepType::First; n_envs];
        let mut reward = vec![0.0f32; n_envs];
        let mut discount = vec![1.0f32; n_envs];
        let mut episode_return = vec![0.0f32; n_envs];
        let mut state = alg.initial_state(n_envs);
        let mut history = Vec::with_capacity(self.config.num_iterations);

        for iteration in 0..self.config.num_iterations {
            let mut finished: Vec<f32> = Vec::new();
            alg.set_training_progress(
                TrainingProgress::at_iteration(iteration as u64, total)
                    .with_env_steps(self.env_steps)
                    .with_global_counter(self.counter.get()),
            );

            for _ in 0..self.config.unroll_length {
                let inputs = TimeStep::new(
                    tensor_2d::<B>(env.get_observations(), n_envs, obs_size, &device),
                    step_type.clone(),
                    reward.clone(),
                    discount.clone(),
                );
                let step = alg.rollout_step(&inputs, state)?;
                alg.observe_for_replay(Experience::from_rollout(&inputs, &step.info)?)?;
                state = step.state;

                let pending = ResetMask::from_dones(
                    &step_type.iter().map(|s| s.is_last()).collect::<Vec<_>>(),
                );
                let result = env.step(&step.output);
                if pending.any() {
                    env.reset_envs(&pending, self.seed.wrapping_add(reset_count));
                    reset_count += 1;
                }
                self.env_steps += n_envs as u64;

                for i in 0..n_envs {
                    if pending.as_slice()[i] {
                        step_type[i] = StepType::First;
                        reward[i] = 0.0;
                        discount[i] = 1.0;
                        episode_return[i] = 0.0;
                        continue;
                    }
                    reward[i] = result.rewards[i];
                    episode_return[i] += result.rewards[i];
                    if result.terminals[i] || result.truncations[i] {
                        step_type[i] = StepType::Last;
                        discount[i] = if result.terminals[i] { 0.0 } else { 1.0 };
                        finished.push(episode_return[i]);
                    } else {
                        step_type[i] = StepType::Mid;
                        discount[i] = 1.0;
                    }
                }
            }

            let replay = train_from_replay_buffer::<B, _, _>(
                alg,
                &options,
                Some(&mut self.counter),
                &mut self.rng,
            )?;
            alg.after_train_iter(&self.counter, &options)?;

            let stats = IterationStats {
                iteration,
                global_counter: self.counter.get(),
                env_steps: self.env_steps,
                mean_loss: replay.mean_loss,
                episodes: finished.len(),
                mean_episode_return: if finished.is_empty() {
                    None
                } else {
                    Some(finished.iter().sum::<f32>() / finished.len() as f32)
                },
            };

            log::info!(
                "Iteration {:>4} | steps {:>8} | loss {:>8.4} | episodes {:>3} | return {}",
                iteration,
                stats.env_steps,
                stats.mean_loss,
                stats.episodes,
                stats
                    .mean_episode_return
                    .map_or_else(|| "-".to_string(), |r| format!("{:.2}", r))
            );

            on_iteration(&stats, alg)?;
            history.push(stats);
        }

        Ok(history)
    }
}
