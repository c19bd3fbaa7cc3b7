//! PPG on CartPole.
//!
//! A disjoint policy/value network with an auxiliary value head on the policy
//! trunk. Every `AUX_INTERVAL` iterations the auxiliary phase distills the
//! returns into the policy trunk. The policy network is checkpointed to
//! `./checkpoints/ppg_cartpole`, and a rerun resumes from the latest one.

use burn::backend::{Autodiff, NdArray};
use burn::optim::AdamConfig;

use phasic_rl::scheduling::LinearScheduler;
use phasic_rl::{
    as_scheduler, Checkpointer, CheckpointerConfig, Phase, PolicyValueNetConfig, PpgAlgorithm,
    PpgConfig, PpoLossConfig, ProgressType, Result, TdLossFn, Trainer, TrainerConfig,
};

use crate::cartpole::CartPoleEnv;

type B = Autodiff<NdArray<f32>>;

const N_ENVS: usize = 16;
const AUX_INTERVAL: u64 = 8;
const SEED: u64 = 42;

pub fn run(anneal_lr: bool) {
    if let Err(e) = train(anneal_lr) {
        log::error!("Training failed: {}", e);
    }
}

fn train(anneal_lr: bool) -> Result<()> {
    let device = Default::default();

    let trainer_config = TrainerConfig::new()
        .with_unroll_length(32)
        .with_mini_batch_size(128)
        .with_num_updates_per_train_iter(4)
        .with_num_iterations(200);

    let config = PpgConfig::new()
        .with_aux_phase_interval(AUX_INTERVAL)
        .with_policy_loss(
            PpoLossConfig::new()
                .with_entropy_regularization(0.01)
                .with_td_loss_fn(TdLossFn::Huber),
        )
        .with_seed(SEED)
        .inherit_trainer_defaults(&trainer_config);

    let network = PolicyValueNetConfig::new(CartPoleEnv::OBS_SIZE, CartPoleEnv::N_ACTIONS)
        .with_hidden_sizes(vec![100])
        .init::<B>(&device)?;

    let mut alg = PpgAlgorithm::new(
        config,
        network,
        AdamConfig::new().init(),
        AdamConfig::new().init(),
        device,
    )?;
    if anneal_lr {
        let schedule = LinearScheduler::new(ProgressType::Percent, &[(0.0, 1e-3), (1.0, 1e-5)])?;
        alg = alg.with_learning_rate_schedule(Phase::Policy, as_scheduler(schedule));
    }

    let mut checkpointer = Checkpointer::new(
        CheckpointerConfig::new("./checkpoints/ppg_cartpole")
            .with_save_interval(25)
            .with_keep_last_n(3),
    )?;
    let mut trainer = Trainer::new(trainer_config, SEED)?;
    match checkpointer.restore_policy(&mut alg, &device)? {
        Some(step) => {
            log::info!("Resuming from checkpoint at step {}", step);
            trainer = trainer.with_global_counter(step);
        }
        None => log::info!("No checkpoint found, training from scratch"),
    }

    let mut env = CartPoleEnv::new(N_ENVS, 500);

    let history = trainer.run::<B, _, _, _>(&mut alg, &mut env, |stats, alg| {
        if checkpointer.should_save(stats.global_counter) {
            checkpointer.save_policy(alg, stats.global_counter, stats.mean_episode_return)?;
        }
        Ok(())
    })?;

    let stats = alg.aux_stats();
    log::info!(
        "Done: {} iterations, {} auxiliary phases ({} skipped), {} auxiliary updates",
        history.len(),
        stats.entries,
        stats.skipped_empty,
        stats.updates
    );
    if let Some(best) = history.iter().filter_map(|s| s.mean_episode_return).reduce(f32::max) {
        log::info!("Best mean episode return: {:.1}", best);
    }
    Ok(())
}
