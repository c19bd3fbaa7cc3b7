//! Policy network checkpointing.
//!
//! Only the policy network is persisted: the auxiliary network is resynced
//! from it on every auxiliary phase entry, so it carries no state of its own
//! between phases.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut checkpointer = Checkpointer::new(
//!     CheckpointerConfig::new("./checkpoints").with_save_interval(10),
//! )?;
//!
//! // In the iteration callback:
//! if checkpointer.should_save(stats.global_counter) {
//!     checkpointer.save_policy(&alg, stats.global_counter, stats.mean_episode_return)?;
//! }
//!
//! // Resume, continuing the counter from the restored step:
//! if let Some(step) = checkpointer.restore_policy(&mut alg, &device)? {
//!     trainer = trainer.with_global_counter(step);
//! }
//! ```

pub mod checkpointer;

pub use checkpointer::{CheckpointInfo, Checkpointer, CheckpointerConfig};
