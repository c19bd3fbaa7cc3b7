//! Loss terms shared by the policy and auxiliary phases.
//!
//! # Numerical Stability
//!
//! Importance ratios are computed via exp(log_ratio) with the log ratio
//! clamped to [-20, 20] to prevent overflow.

use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

/// Maximum log ratio before exp() to prevent overflow.
const MAX_LOG_RATIO: f32 = 20.0;

/// PPO clipped surrogate loss.
///
/// L^CLIP(θ) = E[min(r_t(θ) * A_t, clip(r_t(θ), 1-ε, 1+ε) * A_t)]
///
/// # Arguments
///
/// * `log_probs` - Current policy log probs: [batch_size]
/// * `old_log_probs` - Rollout policy log probs (detached): [batch_size]
/// * `advantages` - Advantages (detached): [batch_size]
/// * `clip_ratio` - Clipping ratio ε (typically 0.2)
///
/// # Returns
///
/// Negative mean clipped surrogate (for minimization), 1 element.
pub fn ppo_clip_loss<B: Backend>(
    log_probs: Tensor<B, 1>,
    old_log_probs: Tensor<B, 1>,
    advantages: Tensor<B, 1>,
    clip_ratio: f32,
) -> Tensor<B, 1> {
    let log_ratio = log_probs - old_log_probs;
    let ratio = log_ratio.clamp(-MAX_LOG_RATIO, MAX_LOG_RATIO).exp();

    let clipped_ratio = ratio.clone().clamp(1.0 - clip_ratio, 1.0 + clip_ratio);

    let surr1 = ratio * advantages.clone();
    let surr2 = clipped_ratio * advantages;

    // Pessimistic bound
    -surr1.min_pair(surr2).mean()
}

/// Element-wise temporal-difference loss between predictions and targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TdLossFn {
    /// (x - y)^2
    #[default]
    Squared,
    /// Huber loss with δ = 1: quadratic inside [-1, 1], linear outside.
    Huber,
}

impl TdLossFn {
    /// Per-element loss: [batch]
    pub fn element_wise<B: Backend>(self, predictions: Tensor<B, 1>, targets: Tensor<B, 1>) -> Tensor<B, 1> {
        let diff = predictions - targets;
        match self {
            TdLossFn::Squared => diff.powf_scalar(2.0),
            TdLossFn::Huber => {
                let abs = diff.abs();
                let quadratic = abs.clone().clamp_max(1.0);
                let linear = abs - quadratic.clone();
                quadratic.powf_scalar(2.0).mul_scalar(0.5) + linear
            }
        }
    }
}

/// Mean TD loss of `predictions` against detached `targets`, 1 element.
pub fn td_error_loss<B: Backend>(
    predictions: Tensor<B, 1>,
    targets: Tensor<B, 1>,
    loss_fn: TdLossFn,
) -> Tensor<B, 1> {
    loss_fn.element_wise(predictions, targets.detach()).mean()
}

/// Value function loss, optionally clipped (PPO2 style) around the rollout
/// value estimate.
///
/// # Arguments
///
/// * `values` - Current value predictions: [batch_size]
/// * `old_values` - Rollout value predictions: [batch_size]
/// * `returns` - Target returns: [batch_size]
/// * `clip_value` - Optional value clipping (e.g., 0.2)
pub fn value_loss<B: Backend>(
    values: Tensor<B, 1>,
    old_values: Tensor<B, 1>,
    returns: Tensor<B, 1>,
    clip_value: Option<f32>,
) -> Tensor<B, 1> {
    match clip_value {
        Some(clip) => {
            let values_clipped =
                old_values.clone() + (values.clone() - old_values).clamp(-clip, clip);

            let loss1 = (values - returns.clone()).powf_scalar(2.0);
            let loss2 = (values_clipped - returns).powf_scalar(2.0);

            loss1.max_pair(loss2).mean()
        }
        None => (values - returns).powf_scalar(2.0).mean(),
    }
}
