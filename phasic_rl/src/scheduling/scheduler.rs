//! Progress-driven value schedulers.
//!
//! A scheduler maps a [`TrainingProgress`] snapshot to a scalar, for
//! hyperparameters that change over training (learning rates, loss weights,
//! exploration). Progress is passed in explicitly on every call.
//!
//! - [`ConstantScheduler`]: fixed value
//! - [`StepScheduler`]: piecewise constant, with optional linear warm-up
//! - [`LinearScheduler`]: piecewise linear interpolation
//! - [`ExponentialScheduler`]: `initial * rate^(progress / decay_time)`
//!
//! All schedules are validated at construction.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::TrainingProgress;
use crate::error::{PhasicError, Result};

// ============================================================================
// ProgressType
// ============================================================================

/// Which notion of training progress a scheduler follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressType {
    /// Fraction of training completed.
    Percent,
    /// Training iterations.
    Iterations,
    /// Environment steps.
    EnvSteps,
    /// Global counter value.
    GlobalCounter,
}

impl ProgressType {
    /// Read this progress measure from a snapshot.
    pub fn read(self, progress: &TrainingProgress) -> f64 {
        match self {
            ProgressType::Percent => progress.percent,
            ProgressType::Iterations => progress.iterations as f64,
            ProgressType::EnvSteps => progress.env_steps as f64,
            ProgressType::GlobalCounter => progress.global_counter as f64,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            ProgressType::Percent => "percent",
            ProgressType::Iterations => "iterations",
            ProgressType::EnvSteps => "env_steps",
            ProgressType::GlobalCounter => "global_counter",
        }
    }
}

impl FromStr for ProgressType {
    type Err = PhasicError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "percent" => Ok(ProgressType::Percent),
            "iterations" => Ok(ProgressType::Iterations),
            "env_steps" => Ok(ProgressType::EnvSteps),
            "global_counter" => Ok(ProgressType::GlobalCounter),
            other => Err(PhasicError::UnknownProgressType(other.to_string())),
        }
    }
}

impl fmt::Display for ProgressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Scheduler trait
// ============================================================================

/// Value generator driven by training progress.
pub trait Scheduler: Send + Sync + fmt::Debug {
    /// Scheduled value at the given progress.
    fn value(&self, progress: &TrainingProgress) -> f64;
}

fn split_schedule(schedule: &[(f64, f64)]) -> Result<(Vec<f64>, Vec<f64>)> {
    if schedule.iter().any(|(p, v)| !p.is_finite() || !v.is_finite()) {
        return Err(PhasicError::InvalidSchedule(
            "progress and value must be finite".to_string(),
        ));
    }
    if schedule.windows(2).any(|w| w[1].0 <= w[0].0) {
        return Err(PhasicError::InvalidSchedule(
            "progress breakpoints must be strictly increasing".to_string(),
        ));
    }
    Ok(schedule.iter().copied().unzip())
}

// ============================================================================
// ConstantScheduler
// ============================================================================

/// Always returns the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantScheduler {
    value: f64,
}

impl ConstantScheduler {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl Scheduler for ConstantScheduler {
    fn value(&self, _progress: &TrainingProgress) -> f64 {
        self.value
    }
}

// ============================================================================
// StepScheduler
// ============================================================================

/// One value per region of training progress.
///
/// The result is the value paired with the smallest breakpoint strictly
/// greater than the current progress (the last value once progress passes
/// every breakpoint). Before `start + warm_up_period` the output ramps
/// linearly from 0 (at `start`) towards the first value.
#[derive(Debug)]
pub struct StepScheduler {
    progress_type: ProgressType,
    progresses: Vec<f64>,
    values: Vec<f64>,
    warm_up_period: f64,
    start: f64,
    index: AtomicUsize,
}

impl StepScheduler {
    /// Create a step schedule of `(progress, value)` pairs.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` if the schedule is empty, breakpoints are not
    /// strictly increasing, or `start + warm_up_period` does not precede the
    /// first breakpoint.
    pub fn new(
        progress_type: ProgressType,
        schedule: &[(f64, f64)],
        warm_up_period: f64,
        start: f64,
    ) -> Result<Self> {
        if schedule.is_empty() {
            return Err(PhasicError::InvalidSchedule(
                "step schedule needs at least one (progress, value) pair".to_string(),
            ));
        }
        if warm_up_period < 0.0 {
            return Err(PhasicError::InvalidSchedule(format!(
                "warm_up_period must be non-negative, got {}",
                warm_up_period
            )));
        }
        let (progresses, values) = split_schedule(schedule)?;
        if !(start + warm_up_period < progresses[0]) {
            return Err(PhasicError::InvalidSchedule(format!(
                "start + warm_up_period ({}) must be less than the first progress ({})",
                start + warm_up_period,
                progresses[0]
            )));
        }

        Ok(Self {
            progress_type,
            progresses,
            values,
            warm_up_period,
            start,
            index: AtomicUsize::new(0),
        })
    }

    /// Step schedule without warm-up.
    pub fn without_warm_up(progress_type: ProgressType, schedule: &[(f64, f64)]) -> Result<Self> {
        // Breakpoints are compared strictly against `start`, so start below
        // the first one.
        let start = schedule.first().map(|(p, _)| p.min(0.0) - 1.0).unwrap_or(0.0);
        Self::new(progress_type, schedule, 0.0, start)
    }
}

impl Scheduler for StepScheduler {
    fn value(&self, progress: &TrainingProgress) -> f64 {
        let progress = self.progress_type.read(progress);

        if progress < self.start + self.warm_up_period {
            if self.warm_up_period <= 0.0 {
                return 0.0;
            }
            return self.values[0] * (progress - self.start).max(0.0) / self.warm_up_period;
        }

        // Resume from the cached region; restart if progress moved backwards
        let mut index = self.index.load(Ordering::Relaxed);
        if index > 0 && progress < self.progresses[index - 1] {
            index = 0;
        }
        while index < self.progresses.len() - 1 && progress >= self.progresses[index] {
            index += 1;
        }
        self.index.store(index, Ordering::Relaxed);

        self.values[index]
    }
}

// ============================================================================
// LinearScheduler
// ============================================================================

/// Linear interpolation between `(progress, value)` breakpoints.
///
/// The first breakpoint must be at progress 0. Past the last breakpoint the
/// last value is held.
#[derive(Debug)]
pub struct LinearScheduler {
    progress_type: ProgressType,
    progresses: Vec<f64>,
    values: Vec<f64>,
    index: AtomicUsize,
}

impl LinearScheduler {
    /// Create a linear schedule.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` if there are fewer than two pairs, the first
    /// progress is not 0, or breakpoints are not strictly increasing.
    pub fn new(progress_type: ProgressType, schedule: &[(f64, f64)]) -> Result<Self> {
        if schedule.len() < 2 {
            return Err(PhasicError::InvalidSchedule(
                "There should be at least two (progress, value) pairs".to_string(),
            ));
        }
        if schedule[0].0 != 0.0 {
            return Err(PhasicError::InvalidSchedule(
                "The first progress for linear scheduler must be 0".to_string(),
            ));
        }
        let (progresses, values) = split_schedule(schedule)?;

        Ok(Self {
            progress_type,
            progresses,
            values,
            index: AtomicUsize::new(1),
        })
    }
}

impl Scheduler for LinearScheduler {
    fn value(&self, progress: &TrainingProgress) -> f64 {
        let progress = self.progress_type.read(progress);
        let n = self.progresses.len();

        let mut index = self.index.load(Ordering::Relaxed);
        if progress < self.progresses[index - 1] {
            index = 1;
        }
        while index < n && progress >= self.progresses[index] {
            index += 1;
        }

        let value = if index < n {
            let (p0, p1) = (self.progresses[index - 1], self.progresses[index]);
            let w = (progress - p0) / (p1 - p0);
            (1.0 - w) * self.values[index - 1] + w * self.values[index]
        } else {
            index -= 1;
            self.values[index]
        };
        self.index.store(index, Ordering::Relaxed);

        value
    }
}

// ============================================================================
// ExponentialScheduler
// ============================================================================

/// Exponential decay: `initial_value * decay_rate^(progress / decay_time)`.
#[derive(Debug, Clone)]
pub struct ExponentialScheduler {
    progress_type: ProgressType,
    initial_value: f64,
    decay_rate: f64,
    decay_time: f64,
}

impl ExponentialScheduler {
    /// Create an exponential schedule.
    ///
    /// # Errors
    ///
    /// `InvalidSchedule` unless `decay_time > 0` and `decay_rate > 0`.
    pub fn new(
        progress_type: ProgressType,
        initial_value: f64,
        decay_rate: f64,
        decay_time: f64,
    ) -> Result<Self> {
        if !(decay_time > 0.0 && decay_time.is_finite()) {
            return Err(PhasicError::InvalidSchedule(format!(
                "decay_time must be positive, got {}",
                decay_time
            )));
        }
        if !(decay_rate > 0.0 && decay_rate.is_finite()) {
            return Err(PhasicError::InvalidSchedule(format!(
                "decay_rate must be positive, got {}",
                decay_rate
            )));
        }
        Ok(Self {
            progress_type,
            initial_value,
            decay_rate,
            decay_time,
        })
    }
}

impl Scheduler for ExponentialScheduler {
    fn value(&self, progress: &TrainingProgress) -> f64 {
        let progress = self.progress_type.read(progress);
        self.initial_value * self.decay_rate.powf(progress / self.decay_time)
    }
}

// ============================================================================
// ScheduledValue
// ============================================================================

/// A hyperparameter that is either a constant or a schedule.
#[derive(Debug, Clone)]
pub enum ScheduledValue {
    Constant(f64),
    Scheduled(Arc<dyn Scheduler>),
}

impl ScheduledValue {
    /// Value at the given progress.
    pub fn value(&self, progress: &TrainingProgress) -> f64 {
        match self {
            ScheduledValue::Constant(v) => *v,
            ScheduledValue::Scheduled(s) => s.value(progress),
        }
    }
}

impl From<f64> for ScheduledValue {
    fn from(value: f64) -> Self {
        ScheduledValue::Constant(value)
    }
}

/// Wrap a schedule as a [`ScheduledValue`].
pub fn as_scheduler<S: Scheduler + 'static>(scheduler: S) -> ScheduledValue {
    ScheduledValue::Scheduled(Arc::new(scheduler))
}
