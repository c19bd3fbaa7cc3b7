//! Behavior tests for the PPG orchestrator.

use std::panic::{catch_unwind, AssertUnwindSafe};

use burn::backend::{Autodiff, NdArray};
use burn::optim::{AdamConfig, Optimizer};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::algorithms::distribution::mode;
use crate::algorithms::loss::{AuxPhaseLossConfig, PpoLossConfig};
use crate::algorithms::network::{DisjointPolicyValueNet, PolicyValueNetConfig, PolicyValueNetwork};
use crate::core::param_sync::parameter_ids;
use crate::core::tensors::{tensor_1d, tensor_2d, to_vec};
use crate::core::{
    parameter_values, BatchInfo, Experience, GlobalCounter, RolloutInfo, StepType, TimeStep,
};
use crate::error::{PhasicError, Result};
use crate::replay::ReplayBuffer;
use crate::trainer::{train_from_replay_buffer, ReplayTrainingOptions, RlAlgorithm};

type B = Autodiff<NdArray<f32>>;
type Net = DisjointPolicyValueNet<B>;

const OBS_SIZE: usize = 4;
const N_ACTIONS: usize = 3;
const N_ENVS: usize = 2;

fn device() -> <B as burn::tensor::backend::Backend>::Device {
    Default::default()
}

fn network() -> Net {
    PolicyValueNetConfig::new(OBS_SIZE, N_ACTIONS)
        .with_hidden_sizes(vec![8])
        .init::<B>(&device())
        .unwrap()
}

fn build(config: PpgConfig) -> PpgAlgorithm<B, Net, impl Optimizer<Net, B>> {
    build_with(config, network())
}

fn build_with(config: PpgConfig, net: Net) -> PpgAlgorithm<B, Net, impl Optimizer<Net, B>> {
    PpgAlgorithm::new(
        config.with_seed(7),
        net,
        AdamConfig::new().init::<B, Net>(),
        AdamConfig::new().init::<B, Net>(),
        device(),
    )
    .unwrap()
}

fn time_step(t: usize) -> TimeStep<B> {
    let obs: Vec<f32> = (0..N_ENVS * OBS_SIZE)
        .map(|i| ((i + 3 * t) as f32 * 0.37).sin())
        .collect();
    let step_type = if t == 0 {
        vec![StepType::First; N_ENVS]
    } else {
        vec![StepType::Mid; N_ENVS]
    };
    let reward = (0..N_ENVS).map(|b| ((b + t) % 2) as f32).collect();
    TimeStep::new(
        tensor_2d(obs, N_ENVS, OBS_SIZE, &device()),
        step_type,
        reward,
        vec![1.0; N_ENVS],
    )
}

/// Roll out `steps` steps, storing them in the visible buffer.
fn collect<A: RlAlgorithm<B, State = ()>>(alg: &mut A, steps: usize) {
    for t in 0..steps {
        let inputs = time_step(t);
        let step = alg.rollout_step(&inputs, ()).unwrap();
        alg.observe_for_replay(Experience::from_rollout(&inputs, &step.info).unwrap())
            .unwrap();
    }
}

fn rng() -> StdRng {
    StdRng::seed_from_u64(11)
}

fn options() -> ReplayTrainingOptions {
    ReplayTrainingOptions {
        mini_batch_size: 4,
        num_updates_per_train_iter: 1,
        clear_replay_buffer: true,
    }
}

/// Hand-built single-env sequence with values and rewards.
fn sequence(
    values: &[f32],
    rewards: &[f32],
    step_types: &[StepType],
) -> (TimeStep<B>, RolloutInfo<B>, BatchInfo) {
    let len = values.len();
    let dev = device();
    let inputs = TimeStep::new(
        tensor_2d(vec![0.0; len * OBS_SIZE], len, OBS_SIZE, &dev),
        step_types.to_vec(),
        rewards.to_vec(),
        vec![1.0; len],
    );
    let info = RolloutInfo {
        action_distribution: tensor_2d(vec![0.0; len * N_ACTIONS], len, N_ACTIONS, &dev),
        action: vec![0; len],
        value: tensor_1d(values, &dev),
        aux: tensor_1d(values, &dev),
        step_type: step_types.to_vec(),
        discount: vec![1.0; len],
        reward: rewards.to_vec(),
    };
    (
        inputs,
        info,
        BatchInfo {
            batch_size: 1,
            length: len,
        },
    )
}

// ============================================================================
// Scoped phase switch
// ============================================================================

mod phase_switch_tests {
    use super::*;

    #[test]
    fn should_start_in_policy_phase() {
        let alg = build(PpgConfig::new());
        assert_eq!(alg.active_phase(), Phase::Policy);
        assert_eq!(alg.visible_buffer(), BufferSlot::Shared);
        assert_eq!(alg.optimizers().len(), 2);
    }

    #[test]
    fn should_expose_aux_buffer_inside_scope() {
        let mut alg = build(PpgConfig::new());
        alg.with_aux_phase_active(|alg| {
            assert_eq!(alg.active_phase(), Phase::Auxiliary);
            assert_eq!(alg.visible_buffer(), BufferSlot::Context(Phase::Auxiliary));
            Ok(())
        })
        .unwrap();

        assert_eq!(alg.active_phase(), Phase::Policy);
        assert_eq!(alg.visible_buffer(), BufferSlot::Shared);
        assert_eq!(alg.aux_stats().entries, 1);
    }

    #[test]
    fn should_restore_policy_phase_after_failing_body() {
        let mut alg = build(PpgConfig::new());
        let result: Result<()> = alg.with_aux_phase_active(|alg| {
            assert_eq!(alg.active_phase(), Phase::Auxiliary);
            Err(PhasicError::Training("body failed".into()))
        });

        assert!(matches!(result, Err(PhasicError::Training(_))));
        assert_eq!(alg.active_phase(), Phase::Policy);
        assert_eq!(alg.visible_buffer(), BufferSlot::Shared);
    }

    #[test]
    fn should_restore_policy_phase_after_panic() {
        let mut alg = build(PpgConfig::new());
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _: Result<()> = alg.with_aux_phase_active(|_| panic!("body panicked"));
        }));

        assert!(outcome.is_err());
        assert_eq!(alg.active_phase(), Phase::Policy);
        assert_eq!(alg.visible_buffer(), BufferSlot::Shared);
    }

    #[test]
    fn should_restore_policy_phase_when_guard_dropped() {
        let mut alg = build(PpgConfig::new());
        {
            let guard = alg.activate_aux_phase().unwrap();
            assert_eq!(guard.active_phase(), Phase::Auxiliary);
        }
        assert_eq!(alg.active_phase(), Phase::Policy);
    }

    #[test]
    fn should_reject_reentrant_activation() {
        let mut alg = build(PpgConfig::new());
        alg.with_aux_phase_active(|alg| {
            assert!(matches!(
                alg.activate_aux_phase(),
                Err(PhasicError::PhaseAlreadyActive)
            ));
            Ok(())
        })
        .unwrap();
        assert_eq!(alg.active_phase(), Phase::Policy);
    }
}

// ============================================================================
// Resync
// ============================================================================

mod resync_tests {
    use super::*;

    #[test]
    fn should_keep_disjoint_parameter_ids() {
        let alg = build(PpgConfig::new());
        let policy_ids = parameter_ids::<B, _>(alg.policy_network());
        let aux_ids = parameter_ids::<B, _>(alg.aux_network());
        assert!(policy_ids.iter().all(|id| !aux_ids.contains(id)));
    }

    #[test]
    fn should_copy_policy_into_aux_on_entry() {
        let mut alg = build(PpgConfig::new());
        alg.restore_policy_parameters(&network()).unwrap();
        assert_ne!(
            parameter_values::<B, _>(alg.policy_network()).unwrap(),
            parameter_values::<B, _>(alg.aux_network()).unwrap()
        );

        alg.with_aux_phase_active(|alg| {
            assert_eq!(
                parameter_values::<B, _>(alg.policy_network())?,
                parameter_values::<B, _>(alg.aux_network())?
            );
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn should_not_touch_inactive_network_on_update() {
        let mut alg = build(PpgConfig::new());
        collect(&mut alg, 3);
        let aux_before = parameter_values::<B, _>(alg.aux_network()).unwrap();
        let policy_before = parameter_values::<B, _>(alg.policy_network()).unwrap();

        train_from_replay_buffer::<B, _, _>(&mut alg, &options(), None, &mut rng()).unwrap();

        assert_eq!(parameter_values::<B, _>(alg.aux_network()).unwrap(), aux_before);
        assert_ne!(
            parameter_values::<B, _>(alg.policy_network()).unwrap(),
            policy_before
        );
    }

    #[test]
    fn should_propagate_aux_updates_to_policy_on_exit() {
        let mut alg = build(PpgConfig::new());
        collect(&mut alg, 3);
        let policy_before = parameter_values::<B, _>(alg.policy_network()).unwrap();

        alg.with_aux_phase_active(|alg| {
            train_from_replay_buffer::<B, _, _>(alg, &options(), None, &mut rng())?;
            Ok(())
        })
        .unwrap();

        let policy_after = parameter_values::<B, _>(alg.policy_network()).unwrap();
        assert_ne!(policy_after, policy_before);
        assert_eq!(policy_after, parameter_values::<B, _>(alg.aux_network()).unwrap());
        assert!(alg.aux_stats().updates > 0);
    }
}

// ============================================================================
// Hooks
// ============================================================================

mod hook_tests {
    use super::*;

    #[test]
    fn should_record_rollout_in_aux_buffer() {
        let mut alg = build(PpgConfig::new());
        let inputs = time_step(0).with_untransformed(tensor_2d(
            vec![0.0; N_ENVS * 16],
            N_ENVS,
            16,
            &device(),
        ));
        let step = alg.rollout_step(&inputs, ()).unwrap();

        assert_eq!(step.output.len(), N_ENVS);
        assert!(step.output.iter().all(|&a| (a as usize) < N_ACTIONS));

        let aux = alg.aux_replay_buffer().unwrap();
        assert_eq!(aux.len(), 1);
        let spec = aux.spec().unwrap();
        assert_eq!(spec.batch_size, N_ENVS);
        assert_eq!(spec.observation_size, OBS_SIZE);
        assert!(alg.shared_replay_buffer().is_empty());
    }

    #[test]
    fn should_skip_aux_buffer_when_disabled() {
        let mut alg = build(PpgConfig::new().with_aux_phase_enabled(false));
        collect(&mut alg, 2);
        assert!(alg.aux_replay_buffer().unwrap().is_empty());
        assert_eq!(alg.shared_replay_buffer().len(), 2);
    }

    #[test]
    fn should_pad_final_advantage_with_zero() {
        let mut alg = build(PpgConfig::new());
        collect(&mut alg, 3);

        let batch = alg.replay_buffer().gather_all().unwrap();
        let batch_info = batch.batch_info();
        let (inputs, rollout) = batch.into_tensors::<B>(&device());
        let values = to_vec(rollout.value.clone()).unwrap();
        let (_, info) = alg.preprocess_experience(inputs, rollout, batch_info).unwrap();

        let advantages = to_vec(info.advantages).unwrap();
        let returns = to_vec(info.returns).unwrap();
        assert_eq!(advantages.len(), N_ENVS * 3);
        for b in 0..N_ENVS {
            assert_eq!(advantages[b * 3 + 2], 0.0);
        }
        for i in 0..advantages.len() {
            assert!((returns[i] - (values[i] + advantages[i])).abs() < 1e-5);
        }
    }

    #[test]
    fn should_give_zero_advantage_for_single_last_step() {
        let alg = build(PpgConfig::new());
        let (inputs, rollout, batch_info) = sequence(&[0.5], &[1.0], &[StepType::Last]);
        let (_, info) = alg.preprocess_experience(inputs, rollout, batch_info).unwrap();

        assert_eq!(to_vec(info.advantages).unwrap(), vec![0.0]);
        assert!((to_vec(info.returns).unwrap()[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn should_take_advantage_parameters_from_policy_phase_by_default() {
        let config = PpgConfig::new()
            .with_policy_loss(PpoLossConfig::new().with_gamma(0.9).with_td_lambda(1.0))
            .with_aux_loss(AuxPhaseLossConfig::new().with_gamma(0.5).with_td_lambda(1.0));
        let mut alg = build(config);

        let steps = [StepType::First, StepType::Mid];
        let (inputs, rollout, batch_info) = sequence(&[0.0, 1.0], &[0.0, 1.0], &steps);
        let (_, outside) = alg
            .preprocess_experience(inputs.clone(), rollout.clone(), batch_info)
            .unwrap();
        let inside = alg
            .with_aux_phase_active(|alg| alg.preprocess_experience(inputs, rollout, batch_info))
            .unwrap()
            .1;

        let outside = to_vec(outside.advantages).unwrap();
        assert!((outside[0] - 1.9).abs() < 1e-5);
        assert_eq!(outside, to_vec(inside.advantages).unwrap());
    }

    #[test]
    fn should_take_advantage_parameters_from_active_phase_when_configured() {
        let config = PpgConfig::new()
            .with_policy_loss(PpoLossConfig::new().with_gamma(0.9).with_td_lambda(1.0))
            .with_aux_loss(AuxPhaseLossConfig::new().with_gamma(0.5).with_td_lambda(1.0))
            .with_advantage_source(AdvantageSource::ActivePhase);
        let mut alg = build(config);

        let steps = [StepType::First, StepType::Mid];
        let (inputs, rollout, batch_info) = sequence(&[0.0, 1.0], &[0.0, 1.0], &steps);
        let inside = alg
            .with_aux_phase_active(|alg| alg.preprocess_experience(inputs, rollout, batch_info))
            .unwrap()
            .1;

        assert!((to_vec(inside.advantages).unwrap()[0] - 1.5).abs() < 1e-5);
    }

    #[test]
    fn should_act_with_policy_network_while_aux_phase_active() {
        let mut alg = build(PpgConfig::new());
        collect(&mut alg, 3);
        let inputs = time_step(1);

        alg.with_aux_phase_active(|alg| {
            let options = ReplayTrainingOptions {
                clear_replay_buffer: false,
                ..options()
            };
            train_from_replay_buffer::<B, _, _>(alg, &options, None, &mut rng())?;

            let (policy, ()) = alg.policy_network().forward(inputs.observation.clone(), ());
            let (aux, ()) = alg.aux_network().forward(inputs.observation.clone(), ());
            assert_ne!(to_vec(policy.value.clone())?, to_vec(aux.value.clone())?);

            let rollout = alg.rollout_step(&inputs, ())?;
            let predicted = alg.predict_step(&inputs, (), Some(0.0))?;
            for info in [&rollout.info, &predicted.info] {
                assert_eq!(
                    to_vec(info.action_distribution.clone())?,
                    to_vec(policy.logits.clone())?
                );
                assert_eq!(to_vec(info.value.clone())?, to_vec(policy.value.clone())?);
            }
            assert_eq!(predicted.output, mode(&policy.logits)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn should_predict_argmax_without_exploration() {
        let mut alg = build(PpgConfig::new());
        let inputs = time_step(1);
        let step = alg.predict_step(&inputs, (), Some(0.0)).unwrap();

        let (output, ()) = alg
            .policy_network()
            .forward(inputs.observation.clone(), ());
        assert_eq!(step.output, mode(&output.logits).unwrap());
        assert!(alg.aux_replay_buffer().unwrap().is_empty());
    }
}

// ============================================================================
// After-train-iteration trigger
// ============================================================================

mod trigger_tests {
    use super::*;

    #[test]
    fn should_enter_aux_phase_exactly_at_interval_multiples() {
        let mut alg = build(PpgConfig::new().with_aux_phase_interval(4));
        let mut counter = GlobalCounter::new();
        let mut entered_at = Vec::new();

        for _ in 0..8 {
            collect(&mut alg, 3);
            let mut shuffle = rng();
            train_from_replay_buffer::<B, _, _>(&mut alg, &options(), Some(&mut counter), &mut shuffle)
                .unwrap();

            let entries_before = alg.aux_stats().entries;
            let policy_before = parameter_values::<B, _>(alg.policy_network()).unwrap();
            alg.after_train_iter(&counter, &options()).unwrap();
            let policy_after = parameter_values::<B, _>(alg.policy_network()).unwrap();

            if alg.aux_stats().entries > entries_before {
                entered_at.push(counter.get());
                assert_ne!(policy_after, policy_before);
            } else {
                assert_eq!(policy_after, policy_before);
            }
            assert_eq!(alg.active_phase(), Phase::Policy);
        }

        assert_eq!(counter.get(), 8);
        assert_eq!(entered_at, vec![4, 8]);
        assert_eq!(alg.aux_stats().last_triggered_at, Some(8));
        assert!(alg.aux_stats().last_loss.is_some());
    }

    #[test]
    fn should_not_advance_counter_during_aux_phase() {
        let mut alg = build(PpgConfig::new().with_aux_phase_interval(1));
        let mut counter = GlobalCounter::new();
        collect(&mut alg, 3);
        train_from_replay_buffer::<B, _, _>(&mut alg, &options(), Some(&mut counter), &mut rng())
            .unwrap();

        alg.after_train_iter(&counter, &options()).unwrap();

        assert_eq!(counter.get(), 1);
        assert_eq!(alg.aux_stats().entries, 1);
        assert!(alg.aux_replay_buffer().unwrap().is_empty());
    }

    #[test]
    fn should_skip_aux_phase_with_empty_buffer() {
        let mut alg = build(PpgConfig::new().with_aux_phase_interval(4));
        alg.after_train_iter(&GlobalCounter::starting_at(4), &options())
            .unwrap();

        assert_eq!(alg.aux_stats().entries, 0);
        assert_eq!(alg.aux_stats().skipped_empty, 1);
        assert_eq!(alg.active_phase(), Phase::Policy);
    }

    #[test]
    fn should_reproduce_training_with_same_seed() {
        let net = network();
        let run = |net: Net| {
            let mut alg = build_with(PpgConfig::new().with_aux_phase_interval(1), net);
            let mut counter = GlobalCounter::new();
            let options = ReplayTrainingOptions {
                mini_batch_size: 2,
                num_updates_per_train_iter: 2,
                clear_replay_buffer: true,
            };
            collect(&mut alg, 4);
            train_from_replay_buffer::<B, _, _>(&mut alg, &options, Some(&mut counter), &mut rng())
                .unwrap();
            alg.after_train_iter(&counter, &options).unwrap();
            assert_eq!(alg.aux_stats().entries, 1);
            parameter_values::<B, _>(alg.policy_network()).unwrap()
        };

        assert_eq!(run(net.clone()), run(net));
    }

    #[test]
    fn should_never_trigger_when_disabled() {
        let mut alg = build(
            PpgConfig::new()
                .with_aux_phase_interval(1)
                .with_aux_phase_enabled(false),
        );
        collect(&mut alg, 2);
        alg.after_train_iter(&GlobalCounter::starting_at(1), &options())
            .unwrap();
        assert_eq!(alg.aux_stats().entries, 0);
    }
}
