//! Algorithm components for phasic training.
//!
//! - `gae`: Generalized Advantage Estimation over batched sequences
//! - `distribution`: Categorical sampling, log-probs, entropy and KL
//! - `policy_loss`: PPO clipped surrogate and TD losses
//! - `loss`: Per-phase loss functions (PPO and auxiliary)
//! - `network`: Policy/value/auxiliary network trait and default network

pub mod distribution;
pub mod gae;
pub mod loss;
pub mod network;
pub mod policy_loss;

pub use distribution::{entropy, kl_divergence, log_prob, mode, select_actions, Exploration};
pub use gae::{extend_with_zero, generalized_advantage_estimation, normalize_advantages, SequenceLayout};
pub use loss::{AuxPhaseLoss, AuxPhaseLossConfig, PhaseLoss, PpoLoss, PpoLossConfig};
pub use network::{DisjointPolicyValueNet, NetworkOutput, PolicyValueNetConfig, PolicyValueNetwork};
pub use policy_loss::{ppo_clip_loss, td_error_loss, value_loss, TdLossFn};
