//! Phase loss functions.
//!
//! Each phase owns one [`PhaseLoss`]. Both read a self-contained
//! [`TrainInfo`] record and report the discount factor and trace-decay
//! parameter used for advantage estimation.
//!
//! ```text
//! policy phase:    L = L^CLIP + c_td * TD(value, returns) - c_ent * H(π)
//! auxiliary phase: L = TD(aux, returns) + TD(value, returns)
//!                    + w_kl * KL(π_rollout || π)
//! ```

use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

use super::distribution::{entropy, kl_divergence, log_prob};
use super::gae::normalize_advantages;
use super::policy_loss::{ppo_clip_loss, td_error_loss, TdLossFn};
use crate::core::tensors::{tensor_1d, to_scalar, to_vec};
use crate::core::{LossInfo, TrainInfo};
use crate::error::{PhasicError, Result};

/// Loss function of one training phase.
pub trait PhaseLoss<B: Backend> {
    /// Compute the scalar loss and diagnostics for a training batch.
    fn loss(&self, info: &TrainInfo<B>) -> Result<LossInfo<B>>;

    /// Discount factor γ.
    fn gamma(&self) -> f32;

    /// Trace-decay λ.
    fn td_lambda(&self) -> f32;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}

fn validate_unit_interval(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(PhasicError::config(format!(
            "{} must be in [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

// ============================================================================
// PPO loss (policy phase)
// ============================================================================

/// Configuration for [`PpoLoss`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PpoLossConfig {
    /// Discount factor γ.
    pub gamma: f32,
    /// Trace-decay λ.
    pub td_lambda: f32,
    /// Importance ratio clipping ε.
    pub clip_ratio: f32,
    /// Entropy bonus coefficient.
    pub entropy_regularization: f32,
    /// Weight of the value TD loss.
    pub td_loss_weight: f32,
    /// Element-wise TD loss.
    pub td_loss_fn: TdLossFn,
    /// Normalize advantages per minibatch.
    pub normalize_advantages: bool,
}

impl Default for PpoLossConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            td_lambda: 0.95,
            clip_ratio: 0.2,
            entropy_regularization: 0.0,
            td_loss_weight: 1.0,
            td_loss_fn: TdLossFn::Squared,
            normalize_advantages: true,
        }
    }
}

impl PpoLossConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_td_lambda(mut self, td_lambda: f32) -> Self {
        self.td_lambda = td_lambda;
        self
    }

    pub fn with_clip_ratio(mut self, clip_ratio: f32) -> Self {
        self.clip_ratio = clip_ratio;
        self
    }

    pub fn with_entropy_regularization(mut self, coef: f32) -> Self {
        self.entropy_regularization = coef;
        self
    }

    pub fn with_td_loss_weight(mut self, weight: f32) -> Self {
        self.td_loss_weight = weight;
        self
    }

    pub fn with_td_loss_fn(mut self, loss_fn: TdLossFn) -> Self {
        self.td_loss_fn = loss_fn;
        self
    }

    pub fn with_normalize_advantages(mut self, normalize: bool) -> Self {
        self.normalize_advantages = normalize;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_unit_interval("gamma", self.gamma)?;
        validate_unit_interval("td_lambda", self.td_lambda)?;
        if !(self.clip_ratio > 0.0 && self.clip_ratio < 1.0) {
            return Err(PhasicError::config(format!(
                "clip_ratio must be in (0, 1), got {}",
                self.clip_ratio
            )));
        }
        if self.entropy_regularization < 0.0 || self.td_loss_weight < 0.0 {
            return Err(PhasicError::config("loss weights must be non-negative"));
        }
        Ok(())
    }

    /// Build the loss.
    pub fn init(self) -> Result<PpoLoss> {
        self.validate()?;
        Ok(PpoLoss { config: self })
    }
}

/// Clipped-surrogate policy loss with value and entropy terms.
#[derive(Debug, Clone)]
pub struct PpoLoss {
    config: PpoLossConfig,
}

impl PpoLoss {
    pub fn config(&self) -> &PpoLossConfig {
        &self.config
    }
}

impl<B: Backend> PhaseLoss<B> for PpoLoss {
    fn loss(&self, info: &TrainInfo<B>) -> Result<LossInfo<B>> {
        let device = info.returns.device();

        let log_probs = log_prob(info.action_distribution.clone(), &info.action);
        let old_log_probs =
            log_prob(info.rollout_action_distribution.clone().detach(), &info.action).detach();

        let advantages = if self.config.normalize_advantages {
            let mut adv = to_vec(info.advantages.clone().detach())?;
            normalize_advantages(&mut adv);
            tensor_1d(&adv, &device)
        } else {
            info.advantages.clone().detach()
        };

        let approx_kl = (old_log_probs.clone() - log_probs.clone()).mean();
        let pg_loss = ppo_clip_loss(log_probs, old_log_probs, advantages, self.config.clip_ratio);
        let td_loss = td_error_loss(info.value.clone(), info.returns.clone(), self.config.td_loss_fn);
        let entropy: Tensor<B, 1> = entropy(info.action_distribution.clone()).mean();

        let total = pg_loss.clone()
            + td_loss.clone().mul_scalar(self.config.td_loss_weight)
            - entropy.clone().mul_scalar(self.config.entropy_regularization);

        Ok(LossInfo::new(total)
            .with_extra("pg_loss", to_scalar(pg_loss.detach())?)
            .with_extra("td_loss", to_scalar(td_loss.detach())?)
            .with_extra("entropy", to_scalar(entropy.detach())?)
            .with_extra("approx_kl", to_scalar(approx_kl.detach())?))
    }

    fn gamma(&self) -> f32 {
        self.config.gamma
    }

    fn td_lambda(&self) -> f32 {
        self.config.td_lambda
    }

    fn name(&self) -> &'static str {
        "ppo"
    }
}

// ============================================================================
// Auxiliary phase loss
// ============================================================================

/// Configuration for [`AuxPhaseLoss`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuxPhaseLossConfig {
    /// Discount factor γ.
    pub gamma: f32,
    /// Trace-decay λ.
    pub td_lambda: f32,
    /// Element-wise TD loss for both value heads.
    pub td_loss_fn: TdLossFn,
    /// Weight of the behavior-cloning KL term.
    pub policy_kl_loss_weight: f32,
}

impl Default for AuxPhaseLossConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            td_lambda: 0.95,
            td_loss_fn: TdLossFn::Squared,
            policy_kl_loss_weight: 1.0,
        }
    }
}

impl AuxPhaseLossConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_td_lambda(mut self, td_lambda: f32) -> Self {
        self.td_lambda = td_lambda;
        self
    }

    pub fn with_td_loss_fn(mut self, loss_fn: TdLossFn) -> Self {
        self.td_loss_fn = loss_fn;
        self
    }

    pub fn with_policy_kl_loss_weight(mut self, weight: f32) -> Self {
        self.policy_kl_loss_weight = weight;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_unit_interval("gamma", self.gamma)?;
        validate_unit_interval("td_lambda", self.td_lambda)?;
        if self.policy_kl_loss_weight < 0.0 {
            return Err(PhasicError::config("policy_kl_loss_weight must be non-negative"));
        }
        Ok(())
    }

    /// Build the loss.
    pub fn init(self) -> Result<AuxPhaseLoss> {
        self.validate()?;
        Ok(AuxPhaseLoss { config: self })
    }
}

/// Auxiliary-phase loss: fit both value heads to the returns while keeping
/// the policy close to its rollout-time distribution.
#[derive(Debug, Clone)]
pub struct AuxPhaseLoss {
    config: AuxPhaseLossConfig,
}

impl AuxPhaseLoss {
    pub fn config(&self) -> &AuxPhaseLossConfig {
        &self.config
    }
}

impl<B: Backend> PhaseLoss<B> for AuxPhaseLoss {
    fn loss(&self, info: &TrainInfo<B>) -> Result<LossInfo<B>> {
        let aux_td = td_error_loss(info.aux.clone(), info.returns.clone(), self.config.td_loss_fn);
        let value_td = td_error_loss(info.value.clone(), info.returns.clone(), self.config.td_loss_fn);
        let kl: Tensor<B, 1> = kl_divergence(
            info.rollout_action_distribution.clone().detach(),
            info.action_distribution.clone(),
        )
        .mean();

        let total = aux_td.clone()
            + value_td.clone()
            + kl.clone().mul_scalar(self.config.policy_kl_loss_weight);

        Ok(LossInfo::new(total)
            .with_extra("aux_td_loss", to_scalar(aux_td.detach())?)
            .with_extra("value_td_loss", to_scalar(value_td.detach())?)
            .with_extra("policy_kl", to_scalar(kl.detach())?))
    }

    fn gamma(&self) -> f32 {
        self.config.gamma
    }

    fn td_lambda(&self) -> f32 {
        self.config.td_lambda
    }

    fn name(&self) -> &'static str {
        "aux_phase"
    }
}
