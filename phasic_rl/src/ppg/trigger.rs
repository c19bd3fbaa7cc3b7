//! Periodic trigger for the auxiliary phase.

use crate::error::{PhasicError, Result};

/// Fires when the global counter reaches a multiple of `interval`.
///
/// Edge triggered: each qualifying counter value fires at most once, and
/// multiples that were skipped over are never caught up.
#[derive(Debug, Clone)]
pub struct AuxPhaseTrigger {
    interval: u64,
    last_fired: Option<u64>,
}

impl AuxPhaseTrigger {
    /// Create a trigger with a positive interval.
    pub fn new(interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(PhasicError::config("aux_phase interval must be > 0"));
        }
        Ok(Self {
            interval,
            last_fired: None,
        })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Counter value of the last firing.
    pub fn last_fired(&self) -> Option<u64> {
        self.last_fired
    }

    /// Whether `counter` is a firing point, ignoring history.
    #[inline]
    pub fn is_due(&self, counter: u64) -> bool {
        counter % self.interval == 0
    }

    /// Fire if `counter` is a firing point not fired before.
    pub fn poll(&mut self, counter: u64) -> bool {
        if !self.is_due(counter) || self.last_fired == Some(counter) {
            return false;
        }
        self.last_fired = Some(counter);
        true
    }
}
