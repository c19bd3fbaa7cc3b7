//! Error types for phasic training.

use thiserror::Error;

/// Result type for phasic_rl operations.
pub type Result<T> = std::result::Result<T, PhasicError>;

/// Errors raised by the phase machinery, schedulers and replay training.
///
/// Configuration errors (`StructureMismatch`, `UnknownProgressType`,
/// `InvalidSchedule`, `InvalidConfig`) are fatal and surface at construction
/// time. Runtime errors raised inside an auxiliary phase propagate to the
/// caller only after the policy phase has been restored.
#[derive(Debug, Error)]
pub enum PhasicError {
    /// Two networks that should share a parameter layout do not.
    #[error("Parameter structure mismatch: {0}")]
    StructureMismatch(String),

    /// Progress type string not recognized by a scheduler.
    #[error("Unknown progress_type: {0}")]
    UnknownProgressType(String),

    /// Schedule breakpoints violate an ordering requirement.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Experience does not match the spec frozen by the first observation.
    #[error("Experience spec mismatch: expected {expected}, got {got}")]
    ExperienceSpecMismatch { expected: String, got: String },

    /// Replay training was asked to gather from a buffer with no data.
    #[error("Replay buffer is empty")]
    EmptyReplayBuffer,

    /// Tensor data could not be read back.
    #[error("Tensor error: {0}")]
    Tensor(String),

    /// Checkpoint save or load failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// The auxiliary phase was activated while already active.
    #[error("Auxiliary phase is already active")]
    PhaseAlreadyActive,

    /// Failure raised by a caller-supplied training body.
    #[error("Training error: {0}")]
    Training(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PhasicError {
    /// Convenience constructor for configuration errors.
    pub fn config(msg: impl Into<String>) -> Self {
        PhasicError::InvalidConfig(msg.into())
    }
}
