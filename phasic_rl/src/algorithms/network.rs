//! Policy/value network abstraction for phasic training.
//!
//! A PPG network produces three heads from an observation batch:
//!
//! ```text
//! observation ─┬─► policy trunk ─┬─► logits        (policy head)
//!              │                 └─► aux value     (auxiliary head)
//!              └─► value trunk ──────► value
//! ```
//!
//! The auxiliary head shares the policy trunk, so fitting it to the returns
//! during the auxiliary phase distills value features into the policy
//! representation.

use std::fmt::Debug;

use burn::module::AutodiffModule;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation::relu;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::error::{PhasicError, Result};

/// Output heads of a policy/value network.
#[derive(Debug, Clone)]
pub struct NetworkOutput<B: Backend> {
    /// Action logits: [batch, n_actions]
    pub logits: Tensor<B, 2>,
    /// Value estimates: [batch]
    pub value: Tensor<B, 1>,
    /// Auxiliary value estimates: [batch]
    pub aux: Tensor<B, 1>,
}

/// A trainable network usable by either phase.
///
/// Implementations must be deterministic in their parameter traversal order so
/// that two instances of the same architecture can be resynchronized by value.
pub trait PolicyValueNetwork<B: AutodiffBackend>: AutodiffModule<B> {
    /// Recurrent state (`()` for feed-forward networks).
    type State: Clone + Debug;

    /// Initial recurrent state for `batch_size` rows.
    fn initial_state(&self, batch_size: usize) -> Self::State;

    /// Evaluate all heads.
    fn forward(&self, observation: Tensor<B, 2>, state: Self::State) -> (NetworkOutput<B>, Self::State);

    /// Number of discrete actions.
    fn num_actions(&self) -> usize;
}

// ============================================================================
// DisjointPolicyValueNet
// ============================================================================

/// Configuration for [`DisjointPolicyValueNet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyValueNetConfig {
    /// Observation feature size.
    pub obs_size: usize,
    /// Number of discrete actions.
    pub n_actions: usize,
    /// Hidden layer widths, shared by both trunks.
    pub hidden_sizes: Vec<usize>,
}

impl PolicyValueNetConfig {
    /// Create a config with a single 64-unit hidden layer.
    pub fn new(obs_size: usize, n_actions: usize) -> Self {
        Self {
            obs_size,
            n_actions,
            hidden_sizes: vec![64],
        }
    }

    /// Set the hidden layer widths.
    pub fn with_hidden_sizes(mut self, hidden_sizes: Vec<usize>) -> Self {
        self.hidden_sizes = hidden_sizes;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.obs_size == 0 {
            return Err(PhasicError::config("obs_size must be > 0"));
        }
        if self.n_actions == 0 {
            return Err(PhasicError::config("n_actions must be > 0"));
        }
        if self.hidden_sizes.iter().any(|&h| h == 0) {
            return Err(PhasicError::config("hidden sizes must be > 0"));
        }
        Ok(())
    }

    /// Build the network.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<DisjointPolicyValueNet<B>> {
        self.validate()?;

        let trunk = |device: &B::Device| {
            let mut layers: Vec<Linear<B>> = Vec::with_capacity(self.hidden_sizes.len());
            let mut d_in = self.obs_size;
            for &d_out in &self.hidden_sizes {
                layers.push(LinearConfig::new(d_in, d_out).init::<B>(device));
                d_in = d_out;
            }
            (layers, d_in)
        };

        let (policy_trunk, policy_out) = trunk(device);
        let (value_trunk, value_out) = trunk(device);

        Ok(DisjointPolicyValueNet {
            policy_trunk,
            policy_head: LinearConfig::new(policy_out, self.n_actions).init(device),
            aux_head: LinearConfig::new(policy_out, 1).init(device),
            value_trunk,
            value_head: LinearConfig::new(value_out, 1).init(device),
        })
    }
}

/// Feed-forward network with disjoint policy and value trunks.
#[derive(Module, Debug)]
pub struct DisjointPolicyValueNet<B: Backend> {
    policy_trunk: Vec<Linear<B>>,
    policy_head: Linear<B>,
    aux_head: Linear<B>,
    value_trunk: Vec<Linear<B>>,
    value_head: Linear<B>,
}

impl<B: Backend> DisjointPolicyValueNet<B> {
    fn run_trunk(layers: &[Linear<B>], x: Tensor<B, 2>) -> Tensor<B, 2> {
        layers.iter().fold(x, |x, layer| relu(layer.forward(x)))
    }

    /// Evaluate all heads on any backend.
    pub fn evaluate(&self, observation: Tensor<B, 2>) -> NetworkOutput<B> {
        let policy_features = Self::run_trunk(&self.policy_trunk, observation.clone());
        let value_features = Self::run_trunk(&self.value_trunk, observation);

        NetworkOutput {
            logits: self.policy_head.forward(policy_features.clone()),
            aux: self.aux_head.forward(policy_features).flatten(0, 1),
            value: self.value_head.forward(value_features).flatten(0, 1),
        }
    }

    /// Number of discrete actions.
    pub fn n_actions(&self) -> usize {
        self.policy_head.weight.dims()[1]
    }
}

impl<B: AutodiffBackend> PolicyValueNetwork<B> for DisjointPolicyValueNet<B> {
    type State = ();

    fn initial_state(&self, _batch_size: usize) -> Self::State {}

    fn forward(&self, observation: Tensor<B, 2>, _state: ()) -> (NetworkOutput<B>, ()) {
        (self.evaluate(observation), ())
    }

    fn num_actions(&self) -> usize {
        self.n_actions()
    }
}
