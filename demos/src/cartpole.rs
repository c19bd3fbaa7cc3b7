//! Vectorized CartPole with the classic control physics.

use phasic_rl::{ResetMask, StepResult, VectorizedEnv};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GRAVITY: f32 = 9.8;
const CART_MASS: f32 = 1.0;
const POLE_MASS: f32 = 0.1;
const POLE_LENGTH: f32 = 0.5;
const FORCE_MAG: f32 = 10.0;
const DT: f32 = 0.02;
const X_THRESHOLD: f32 = 2.4;
const THETA_THRESHOLD: f32 = 12.0 * std::f32::consts::PI / 180.0;
const INIT_RANGE: f32 = 0.05;

/// `n_envs` independent cart-poles. Reward 1 per step survived.
pub struct CartPoleEnv {
    x: Vec<f32>,
    x_dot: Vec<f32>,
    theta: Vec<f32>,
    theta_dot: Vec<f32>,
    steps: Vec<u32>,
    max_steps: u32,
}

impl CartPoleEnv {
    pub const OBS_SIZE: usize = 4;
    pub const N_ACTIONS: usize = 2;

    pub fn new(n_envs: usize, max_steps: u32) -> Self {
        Self {
            x: vec![0.0; n_envs],
            x_dot: vec![0.0; n_envs],
            theta: vec![0.0; n_envs],
            theta_dot: vec![0.0; n_envs],
            steps: vec![0; n_envs],
            max_steps,
        }
    }

    fn reset_single(&mut self, idx: usize, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        self.x[idx] = rng.gen_range(-INIT_RANGE..INIT_RANGE);
        self.x_dot[idx] = rng.gen_range(-INIT_RANGE..INIT_RANGE);
        self.theta[idx] = rng.gen_range(-INIT_RANGE..INIT_RANGE);
        self.theta_dot[idx] = rng.gen_range(-INIT_RANGE..INIT_RANGE);
        self.steps[idx] = 0;
    }

    /// Advance one cart-pole; returns whether it fell or left the track.
    fn step_single(&mut self, idx: usize, action: u32) -> bool {
        let force = if action == 1 { FORCE_MAG } else { -FORCE_MAG };
        let total_mass = CART_MASS + POLE_MASS;
        let pole_mass_length = POLE_MASS * POLE_LENGTH;

        let theta = self.theta[idx];
        let theta_dot = self.theta_dot[idx];
        let (sin_theta, cos_theta) = theta.sin_cos();

        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin_theta) / total_mass;
        let denom = POLE_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / total_mass);
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp) / denom.max(1e-6);
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        self.x[idx] += DT * self.x_dot[idx];
        self.x_dot[idx] += DT * x_acc;
        self.theta[idx] += DT * theta_dot;
        self.theta_dot[idx] += DT * theta_acc;
        self.steps[idx] += 1;

        self.x[idx].abs() > X_THRESHOLD || self.theta[idx].abs() > THETA_THRESHOLD
    }
}

impl VectorizedEnv for CartPoleEnv {
    fn n_envs(&self) -> usize {
        self.x.len()
    }

    fn obs_size(&self) -> usize {
        Self::OBS_SIZE
    }

    fn n_actions(&self) -> usize {
        Self::N_ACTIONS
    }

    fn write_observations(&self, buffer: &mut [f32]) {
        for i in 0..self.n_envs() {
            buffer[i * 4] = self.x[i];
            buffer[i * 4 + 1] = self.x_dot[i];
            buffer[i * 4 + 2] = self.theta[i];
            buffer[i * 4 + 3] = self.theta_dot[i];
        }
    }

    fn step(&mut self, actions: &[u32]) -> StepResult {
        let n = self.n_envs();
        let mut terminals = vec![false; n];
        let mut truncations = vec![false; n];
        for i in 0..n {
            terminals[i] = self.step_single(i, actions[i]);
            truncations[i] = !terminals[i] && self.steps[i] >= self.max_steps;
        }
        StepResult {
            observations: self.get_observations(),
            rewards: vec![1.0; n],
            terminals,
            truncations,
        }
    }

    fn reset_envs(&mut self, mask: &ResetMask, seed: u64) {
        for (i, &reset) in mask.as_slice().iter().enumerate() {
            if reset {
                self.reset_single(i, seed.wrapping_mul(1_000_003).wrapping_add(i as u64));
            }
        }
    }

    fn reset_all(&mut self, seed: u64) {
        for i in 0..self.n_envs() {
            self.reset_single(i, seed.wrapping_mul(1_000_003).wrapping_add(i as u64));
        }
    }
}
