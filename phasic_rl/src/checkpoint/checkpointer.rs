//! Saving and loading policy networks with burn's file recorder.

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::optim::Optimizer;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::{AutodiffBackend, Backend};
use serde::{Deserialize, Serialize};

use crate::algorithms::network::PolicyValueNetwork;
use crate::error::{PhasicError, Result};
use crate::ppg::PpgAlgorithm;

const PREFIX: &str = "policy_";
const EXTENSION: &str = "bin";
const BEST: &str = "best";

/// Configuration for the checkpointer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointerConfig {
    /// Directory to store checkpoints.
    pub checkpoint_dir: PathBuf,
    /// Global counter steps between saves.
    pub save_interval: u64,
    /// Number of recent checkpoints to keep (0 = keep all).
    pub keep_last_n: usize,
    /// Also keep the checkpoint with the highest metric.
    pub save_best: bool,
}

impl Default for CheckpointerConfig {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("./checkpoints"),
            save_interval: 50,
            keep_last_n: 5,
            save_best: true,
        }
    }
}

impl CheckpointerConfig {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_save_interval(mut self, interval: u64) -> Self {
        self.save_interval = interval;
        self
    }

    pub fn with_keep_last_n(mut self, n: usize) -> Self {
        self.keep_last_n = n;
        self
    }

    pub fn with_save_best(mut self, save_best: bool) -> Self {
        self.save_best = save_best;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.save_interval == 0 {
            return Err(PhasicError::config("checkpoint save_interval must be > 0"));
        }
        Ok(())
    }
}

/// A checkpoint on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointInfo {
    pub path: PathBuf,
    /// Global counter value at save time.
    pub step: u64,
    pub metric: Option<f32>,
}

/// Saves policy networks at regular intervals and prunes old ones.
#[derive(Debug)]
pub struct Checkpointer {
    config: CheckpointerConfig,
    best_metric: f32,
    history: Vec<CheckpointInfo>,
}

impl Checkpointer {
    /// Create a checkpointer, creating its directory if needed.
    pub fn new(config: CheckpointerConfig) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.checkpoint_dir)?;
        Ok(Self {
            config,
            best_metric: f32::NEG_INFINITY,
            history: Vec::new(),
        })
    }

    pub fn config(&self) -> &CheckpointerConfig {
        &self.config
    }

    pub fn best_metric(&self) -> f32 {
        self.best_metric
    }

    /// Whether `step` is a save point.
    pub fn should_save(&self, step: u64) -> bool {
        step > 0 && step % self.config.save_interval == 0
    }

    fn path_for(&self, stem: &str) -> PathBuf {
        self.config
            .checkpoint_dir
            .join(format!("{}.{}", stem, EXTENSION))
    }

    /// Save a network under `step`.
    pub fn save<B: Backend, M: Module<B>>(
        &mut self,
        model: &M,
        step: u64,
        metric: Option<f32>,
    ) -> Result<PathBuf> {
        let path = self.path_for(&format!("{}{:08}", PREFIX, step));
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        model
            .clone()
            .save_file(path.clone(), &recorder)
            .map_err(|e| PhasicError::Checkpoint(e.to_string()))?;

        self.history.push(CheckpointInfo {
            path: path.clone(),
            step,
            metric,
        });

        if self.config.save_best {
            if let Some(m) = metric.filter(|&m| m > self.best_metric) {
                self.best_metric = m;
                model
                    .clone()
                    .save_file(self.path_for(BEST), &recorder)
                    .map_err(|e| PhasicError::Checkpoint(e.to_string()))?;
            }
        }

        self.prune()?;
        log::debug!("Saved checkpoint {}", path.display());
        Ok(path)
    }

    /// Load a checkpoint file into `template`.
    pub fn load<B: Backend, M: Module<B>>(
        &self,
        template: M,
        path: &Path,
        device: &B::Device,
    ) -> Result<M> {
        let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
        template
            .load_file(path.to_path_buf(), &recorder, device)
            .map_err(|e| PhasicError::Checkpoint(e.to_string()))
    }

    /// Load the highest-metric checkpoint into `template`.
    pub fn load_best<B: Backend, M: Module<B>>(&self, template: M, device: &B::Device) -> Result<M> {
        let path = self.path_for(BEST);
        if !path.exists() {
            return Err(PhasicError::Checkpoint("no best checkpoint".into()));
        }
        self.load(template, &path, device)
    }

    /// Load the most recent checkpoint into `template`, with its step.
    pub fn load_latest<B: Backend, M: Module<B>>(
        &self,
        template: M,
        device: &B::Device,
    ) -> Result<(M, u64)> {
        let latest = self
            .list_checkpoints()?
            .pop()
            .ok_or_else(|| PhasicError::Checkpoint("no checkpoints found".into()))?;
        let model = self.load(template, &latest.path, device)?;
        Ok((model, latest.step))
    }

    /// Every step checkpoint in the directory, oldest first.
    pub fn list_checkpoints(&self) -> Result<Vec<CheckpointInfo>> {
        let mut checkpoints: Vec<CheckpointInfo> = fs::read_dir(&self.config.checkpoint_dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let path = e.path();
                let step = path
                    .file_name()?
                    .to_str()?
                    .strip_prefix(PREFIX)?
                    .strip_suffix(&format!(".{}", EXTENSION))?
                    .parse()
                    .ok()?;
                Some(CheckpointInfo {
                    path,
                    step,
                    metric: None,
                })
            })
            .collect();

        checkpoints.sort_by_key(|c| c.step);
        Ok(checkpoints)
    }

    /// Save the policy network of `alg`.
    pub fn save_policy<B, N, O>(
        &mut self,
        alg: &PpgAlgorithm<B, N, O>,
        step: u64,
        metric: Option<f32>,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        N: PolicyValueNetwork<B>,
        O: Optimizer<N, B>,
    {
        self.save::<B, N>(alg.policy_network(), step, metric)
    }

    /// Load the latest checkpoint into the policy network of `alg`.
    ///
    /// Returns the step the checkpoint was saved at, or `None` when the
    /// directory holds no checkpoint. A checkpoint that exists but cannot be
    /// read is an error.
    pub fn restore_policy<B, N, O>(
        &self,
        alg: &mut PpgAlgorithm<B, N, O>,
        device: &B::Device,
    ) -> Result<Option<u64>>
    where
        B: AutodiffBackend,
        N: PolicyValueNetwork<B>,
        O: Optimizer<N, B>,
    {
        let Some(latest) = self.list_checkpoints()?.pop() else {
            return Ok(None);
        };
        let loaded = self.load::<B, N>(alg.policy_network().clone(), &latest.path, device)?;
        alg.restore_policy_parameters(&loaded)?;
        log::info!("Restored policy network from step {}", latest.step);
        Ok(Some(latest.step))
    }

    fn prune(&mut self) -> Result<()> {
        if self.config.keep_last_n == 0 {
            return Ok(());
        }
        while self.history.len() > self.config.keep_last_n {
            let old = self.history.remove(0);
            if old.path.exists() {
                fs::remove_file(&old.path)?;
            }
        }
        Ok(())
    }
}
