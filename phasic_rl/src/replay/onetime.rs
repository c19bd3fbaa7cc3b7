//! Accumulating replay buffer with FIFO eviction.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::ReplayBuffer;
use crate::core::{Experience, ExperienceBatch, ExperienceSpec};
use crate::error::{PhasicError, Result};

/// Configuration for [`OnetimeReplayBuffer`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayBufferConfig {
    /// Maximum stored rollout steps (`None` = unbounded).
    ///
    /// When full, the oldest step is evicted to make room.
    pub max_length: Option<usize>,
}

impl ReplayBufferConfig {
    /// Unbounded buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the number of stored steps.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_length == Some(0) {
            return Err(PhasicError::config("replay buffer max_length must be > 0"));
        }
        Ok(())
    }
}

/// Replay buffer that accumulates experience until gathered and cleared.
#[derive(Debug, Clone)]
pub struct OnetimeReplayBuffer {
    name: &'static str,
    max_length: Option<usize>,
    steps: VecDeque<Experience>,
    spec: Option<ExperienceSpec>,
    evicted: u64,
}

impl OnetimeReplayBuffer {
    /// Create a named buffer.
    pub fn new(name: &'static str, config: ReplayBufferConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            name,
            max_length: config.max_length,
            steps: VecDeque::new(),
            spec: None,
            evicted: 0,
        })
    }

    /// Unbounded buffer.
    pub fn unbounded(name: &'static str) -> Self {
        Self {
            name,
            max_length: None,
            steps: VecDeque::new(),
            spec: None,
            evicted: 0,
        }
    }

    /// Name used in log messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total steps evicted because the buffer was full.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

impl ReplayBuffer for OnetimeReplayBuffer {
    fn observe(&mut self, experience: Experience) -> Result<()> {
        match &self.spec {
            Some(spec) => spec.ensure_matches(&experience.spec())?,
            None => {
                log::debug!("{} replay buffer: experience spec {}", self.name, experience.spec());
                self.spec = Some(experience.spec());
            }
        }

        if let Some(max) = self.max_length {
            if self.steps.len() >= max {
                self.steps.pop_front();
                self.evicted += 1;
                if self.evicted == 1 {
                    log::warn!(
                        "{} replay buffer full ({} steps), evicting oldest experience",
                        self.name,
                        max
                    );
                }
            }
        }

        self.steps.push_back(experience);
        Ok(())
    }

    fn len(&self) -> usize {
        self.steps.len()
    }

    fn capacity(&self) -> Option<usize> {
        self.max_length
    }

    fn spec(&self) -> Option<ExperienceSpec> {
        self.spec
    }

    fn gather_all(&self) -> Result<ExperienceBatch> {
        match self.spec {
            Some(spec) if !self.steps.is_empty() => {
                Ok(ExperienceBatch::new(spec, self.steps.iter().cloned().collect()))
            }
            _ => Err(PhasicError::EmptyReplayBuffer),
        }
    }

    fn clear(&mut self) {
        self.steps.clear();
    }
}
