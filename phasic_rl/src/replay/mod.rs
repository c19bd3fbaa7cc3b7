//! Replay buffers feeding `train_from_replay_buffer`.
//!
//! [`OnetimeReplayBuffer`] accumulates experience until it is gathered and
//! cleared. It backs both the shared (policy phase) buffer and the auxiliary
//! buffer.

pub mod onetime;

pub use onetime::{OnetimeReplayBuffer, ReplayBufferConfig};

use crate::core::{Experience, ExperienceBatch, ExperienceSpec};
use crate::error::Result;

/// Storage for replayable experience.
///
/// Lengths are counted in rollout steps; each step holds one row per
/// environment.
pub trait ReplayBuffer {
    /// Append one rollout step.
    ///
    /// The first observation freezes the buffer's [`ExperienceSpec`]; later
    /// observations must match it.
    fn observe(&mut self, experience: Experience) -> Result<()>;

    /// Number of stored rollout steps.
    fn len(&self) -> usize;

    /// Check if the buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of stored steps, if bounded.
    fn capacity(&self) -> Option<usize>;

    /// Frozen experience spec, once the first experience was observed.
    fn spec(&self) -> Option<ExperienceSpec>;

    /// Gather every stored step in time order.
    fn gather_all(&self) -> Result<ExperienceBatch>;

    /// Remove all stored steps. The spec stays frozen.
    fn clear(&mut self);
}
