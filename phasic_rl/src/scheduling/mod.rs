//! Hyperparameter scheduling over training progress.
//!
//! ## Available Schedulers
//!
//! - [`ConstantScheduler`]: No scheduling (constant value)
//! - [`StepScheduler`]: Piecewise constant with optional warm-up
//! - [`LinearScheduler`]: Piecewise linear
//! - [`ExponentialScheduler`]: Exponential decay
//!
//! ## Example
//!
//! ```rust,ignore
//! use phasic_rl::scheduling::{as_scheduler, LinearScheduler, ProgressType};
//!
//! // Learning rate from 3e-4 to 0 over the whole run
//! let lr = as_scheduler(LinearScheduler::new(
//!     ProgressType::Percent,
//!     &[(0.0, 3e-4), (1.0, 0.0)],
//! )?);
//!
//! let value = lr.value(&progress);
//! ```

pub mod scheduler;

#[cfg(test)]
mod tests;

pub use scheduler::{
    as_scheduler,
    ConstantScheduler,
    ExponentialScheduler,
    LinearScheduler,
    ProgressType,
    ScheduledValue,
    Scheduler,
    StepScheduler,
};
