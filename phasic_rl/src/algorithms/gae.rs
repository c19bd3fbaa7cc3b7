//! Generalized Advantage Estimation over batches of sequences.
//!
//! GAE provides a family of policy gradient estimators parameterized by λ:
//! - λ = 0: one-step TD (low variance, high bias)
//! - λ = 1: Monte Carlo (high variance, low bias)
//! - λ ∈ (0, 1): interpolation
//!
//! ## Formula
//!
//! Rewards and discounts are stored on the step they arrive at, so the
//! transition out of step `t` reads them from step `t + 1`:
//!
//! ```text
//! δ_t = r_{t+1} + d_{t+1} V(s_{t+1}) - V(s_t)
//! A_t = (1 - last_t) * (δ_t + d_{t+1} λ A_{t+1})
//! ```
//!
//! A sequence of `T` steps yields `T - 1` advantages: the final step has no
//! successor to bootstrap from. [`extend_with_zero`] restores length `T`.
//!
//! ## References
//!
//! - Schulman et al., "High-Dimensional Continuous Control Using
//!   Generalized Advantage Estimation" (2016)

use crate::core::StepType;

/// Memory layout of a flattened batch of sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLayout {
    /// Number of sequences.
    pub batch_size: usize,
    /// Steps per sequence.
    pub length: usize,
    /// `true`: index `t * batch_size + b`. `false`: index `b * length + t`.
    pub time_major: bool,
}

impl SequenceLayout {
    /// Batch-major layout (`b * length + t`).
    pub fn batch_major(batch_size: usize, length: usize) -> Self {
        Self {
            batch_size,
            length,
            time_major: false,
        }
    }

    /// Time-major layout (`t * batch_size + b`).
    pub fn time_major(batch_size: usize, length: usize) -> Self {
        Self {
            batch_size,
            length,
            time_major: true,
        }
    }

    #[inline]
    fn index(&self, b: usize, t: usize, length: usize) -> usize {
        if self.time_major {
            t * self.batch_size + b
        } else {
            b * length + t
        }
    }
}

/// Compute GAE advantages for every sequence of a flattened batch.
///
/// # Arguments
///
/// * `rewards` - reward received on arrival at each step
/// * `values` - value estimates V(s_t)
/// * `step_types` - step types (advantages stop at `Last`)
/// * `discounts` - per-step discounts, already multiplied by γ
/// * `td_lambda` - trace-decay λ
/// * `layout` - how the flat slices map to `[batch, length]`
///
/// # Returns
///
/// Advantages laid out like the input with `length - 1` steps per sequence.
/// Empty when `length <= 1`.
pub fn generalized_advantage_estimation(
    rewards: &[f32],
    values: &[f32],
    step_types: &[StepType],
    discounts: &[f32],
    td_lambda: f32,
    layout: SequenceLayout,
) -> Vec<f32> {
    let SequenceLayout {
        batch_size,
        length,
        ..
    } = layout;
    let n = batch_size * length;
    assert_eq!(rewards.len(), n);
    assert_eq!(values.len(), n);
    assert_eq!(step_types.len(), n);
    assert_eq!(discounts.len(), n);

    if length <= 1 {
        return Vec::new();
    }

    let out_len = length - 1;
    let mut advantages = vec![0.0f32; batch_size * out_len];

    for b in 0..batch_size {
        let mut next_adv = 0.0f32;
        for t in (0..out_len).rev() {
            let cur = layout.index(b, t, length);
            let next = layout.index(b, t + 1, length);

            let not_last = if step_types[cur].is_last() { 0.0 } else { 1.0 };

            // TD residual: δ_t = r_{t+1} + d_{t+1} * V(s_{t+1}) - V(s_t)
            let delta = rewards[next] + discounts[next] * values[next] - values[cur];

            next_adv = not_last * (delta + discounts[next] * td_lambda * next_adv);
            advantages[layout.index(b, t, out_len)] = next_adv;
        }
    }

    advantages
}

/// Append a zero final step to every sequence of `length - 1` advantages.
///
/// Returns a `[batch, length]` sequence in the same layout.
pub fn extend_with_zero(advantages: &[f32], layout: SequenceLayout) -> Vec<f32> {
    let SequenceLayout {
        batch_size,
        length,
        ..
    } = layout;
    let mut extended = vec![0.0f32; batch_size * length];
    if length <= 1 {
        return extended;
    }

    let short = length - 1;
    debug_assert_eq!(advantages.len(), batch_size * short);
    for b in 0..batch_size {
        for t in 0..short {
            extended[layout.index(b, t, length)] = advantages[layout.index(b, t, short)];
        }
    }
    extended
}

/// Normalize advantages to zero mean and unit variance.
///
/// # Edge Cases
///
/// - Empty slice: no-op
/// - Single element: sets to 0.0 (can't compute meaningful variance)
/// - All same values: sets all to 0.0 (variance is 0, epsilon prevents NaN)
pub fn normalize_advantages(advantages: &mut [f32]) {
    if advantages.is_empty() {
        return;
    }

    if advantages.len() == 1 {
        advantages[0] = 0.0;
        return;
    }

    let n = advantages.len() as f32;
    let mean = advantages.iter().sum::<f32>() / n;
    // Population variance with epsilon for stability
    let variance = advantages.iter().map(|a| (a - mean).powi(2)).sum::<f32>() / n;
    let std = (variance + 1e-8).sqrt();

    for a in advantages.iter_mut() {
        *a = (*a - mean) / std;
    }
}
