//! Categorical action distribution over logits.
//!
//! Sampling and argmax read probabilities back to the host (rollout only);
//! `log_prob`, `entropy` and `kl_divergence` stay on the autodiff graph.

use burn::tensor::activation::{log_softmax, softmax};
use burn::tensor::{backend::Backend, Int, Tensor};
use rand::Rng;

use crate::core::tensors::to_vec;
use crate::error::Result;

/// Exploration rule used when choosing an action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Exploration {
    /// Sample from the predicted distribution.
    Sample,
    /// With probability `epsilon` sample, otherwise take the argmax.
    EpsilonGreedy(f32),
}

impl Exploration {
    /// Epsilon-greedy, collapsing to plain sampling when `epsilon >= 1`.
    pub fn epsilon_greedy(epsilon: f32) -> Self {
        if epsilon >= 1.0 {
            Exploration::Sample
        } else {
            Exploration::EpsilonGreedy(epsilon.max(0.0))
        }
    }
}

/// Choose one action per row of `logits`.
pub fn select_actions<B: Backend, R: Rng>(
    logits: &Tensor<B, 2>,
    exploration: Exploration,
    rng: &mut R,
) -> Result<Vec<u32>> {
    let [batch_size, n_actions] = logits.dims();
    let probs = to_vec(softmax(logits.clone().detach(), 1))?;

    let actions = (0..batch_size)
        .map(|i| {
            let row = &probs[i * n_actions..(i + 1) * n_actions];
            match exploration {
                Exploration::Sample => sample_row(row, rng),
                Exploration::EpsilonGreedy(epsilon) => {
                    if rng.gen::<f32>() < epsilon {
                        sample_row(row, rng)
                    } else {
                        argmax_row(row)
                    }
                }
            }
        })
        .collect();

    Ok(actions)
}

/// Most likely action per row.
pub fn mode<B: Backend>(logits: &Tensor<B, 2>) -> Result<Vec<u32>> {
    let [batch_size, n_actions] = logits.dims();
    let values = to_vec(logits.clone().detach())?;
    Ok((0..batch_size)
        .map(|i| argmax_row(&values[i * n_actions..(i + 1) * n_actions]))
        .collect())
}

fn sample_row<R: Rng>(probs: &[f32], rng: &mut R) -> u32 {
    // Categorical sampling via cumulative sum
    let rand_val = rng.gen::<f32>();
    let mut cumsum = 0.0;
    for (a, p) in probs.iter().enumerate() {
        cumsum += p;
        // Last action absorbs floating-point shortfall in the sum
        if rand_val < cumsum || a == probs.len() - 1 {
            return a as u32;
        }
    }
    0
}

fn argmax_row(values: &[f32]) -> u32 {
    let mut best = 0;
    for (a, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = a;
        }
    }
    best as u32
}

/// Log probabilities of the given actions: [batch]
pub fn log_prob<B: Backend>(logits: Tensor<B, 2>, actions: &[u32]) -> Tensor<B, 1> {
    let batch_size = actions.len();
    let device = logits.device();
    let indices: Vec<i32> = actions.iter().map(|&a| a as i32).collect();
    let indices = Tensor::<B, 1, Int>::from_ints(indices.as_slice(), &device).reshape([batch_size, 1]);

    log_softmax(logits, 1).gather(1, indices).flatten(0, 1)
}

/// Per-row entropy H(π) = -Σ π(a) log π(a): [batch]
pub fn entropy<B: Backend>(logits: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_probs = log_softmax(logits, 1);
    let probs = log_probs.clone().exp();
    -(probs * log_probs).sum_dim(1).flatten(0, 1)
}

/// Per-row KL(p || q) between two categorical distributions: [batch]
pub fn kl_divergence<B: Backend>(p_logits: Tensor<B, 2>, q_logits: Tensor<B, 2>) -> Tensor<B, 1> {
    let log_p = log_softmax(p_logits, 1);
    let log_q = log_softmax(q_logits, 1);
    let p = log_p.clone().exp();
    (p * (log_p - log_q)).sum_dim(1).flatten(0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    type B = NdArray<f32>;

    fn logits(values: &[f32], rows: usize) -> Tensor<B, 2> {
        let cols = values.len() / rows;
        Tensor::<B, 1>::from_floats(values, &Default::default()).reshape([rows, cols])
    }

    #[test]
    fn test_zero_epsilon_is_argmax() {
        let mut rng = StdRng::seed_from_u64(7);
        let l = logits(&[0.0, 3.0, 1.0, 5.0, 0.0, 0.0], 2);
        for _ in 0..20 {
            let actions = select_actions(&l, Exploration::EpsilonGreedy(0.0), &mut rng).unwrap();
            assert_eq!(actions, vec![1, 0]);
        }
        assert_eq!(mode(&l).unwrap(), vec![1, 0]);
    }

    #[test]
    fn test_sampling_follows_distribution() {
        let mut rng = StdRng::seed_from_u64(42);
        // Nearly all mass on action 2
        let l = logits(&[-20.0, -20.0, 20.0], 1);
        let actions = select_actions(&l, Exploration::Sample, &mut rng).unwrap();
        assert_eq!(actions, vec![2]);
    }

    #[test]
    fn test_full_epsilon_collapses_to_sampling() {
        assert_eq!(Exploration::epsilon_greedy(1.0), Exploration::Sample);
        assert_eq!(Exploration::epsilon_greedy(-0.5), Exploration::EpsilonGreedy(0.0));
    }

    #[test]
    fn test_epsilon_greedy_explores() {
        let mut rng = StdRng::seed_from_u64(3);
        // Uniform distribution: argmax is always 0, sampling hits other actions
        let l = logits(&[0.0; 4], 1);
        let explored = (0..200)
            .map(|_| select_actions(&l, Exploration::EpsilonGreedy(0.5), &mut rng).unwrap()[0])
            .any(|a| a != 0);
        assert!(explored);
    }

    #[test]
    fn test_log_prob_uniform() {
        let l = logits(&[0.0, 0.0, 0.0, 0.0], 2);
        let lp = to_vec(log_prob(l, &[0, 1])).unwrap();
        for v in lp {
            assert!((v - 0.5f32.ln()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_entropy_uniform() {
        let l = logits(&[0.0, 0.0, 0.0, 0.0], 1);
        let h = to_vec(entropy(l)).unwrap();
        assert!((h[0] - 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_kl_divergence_zero_for_identical() {
        let l = logits(&[0.5, -1.0, 2.0], 1);
        let kl = to_vec(kl_divergence(l.clone(), l)).unwrap();
        assert!(kl[0].abs() < 1e-6);

        let p = logits(&[2.0, 0.0], 1);
        let q = logits(&[0.0, 2.0], 1);
        assert!(to_vec(kl_divergence(p, q)).unwrap()[0] > 0.0);
    }
}
