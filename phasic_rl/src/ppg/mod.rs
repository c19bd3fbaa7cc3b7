//! Phasic Policy Gradient.
//!
//! - [`PpgAlgorithm`]: the two-phase orchestrator
//! - [`PhaseContext`]: network, optimizer, loss and buffer of one phase
//! - [`AuxPhaseTrigger`]: periodic auxiliary phase trigger
//! - [`PpgConfig`]: algorithm configuration

pub mod algorithm;
pub mod config;
pub mod context;
pub mod trigger;

#[cfg(test)]
mod tests;

pub use algorithm::{AuxPhaseGuard, AuxPhaseStats, PpgAlgorithm};
pub use config::{AdvantageSource, AuxPhaseOptions, PpgConfig, DEFAULT_AUX_PHASE_INTERVAL};
pub use context::{BufferSlot, OptimizerHandle, OptimizerRegistry, Phase, PhaseContext};
pub use trigger::AuxPhaseTrigger;
