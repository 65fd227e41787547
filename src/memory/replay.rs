//! Experience replay buffer
//!
//! Bounded FIFO store of past transitions. Training samples uniformly from
//! it so consecutive fits are not fed consecutive (and heavily correlated)
//! ticks. The buffer outlives individual episodes; experiences from earlier
//! episodes keep getting replayed until capacity pushes them out.

use std::collections::VecDeque;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::{Action, State};
use crate::error::{QtraderError, Result};

/// Default buffer capacity
pub const DEFAULT_CAPACITY: usize = 1000;

/// One stored transition
///
/// Both states are owned snapshots taken at decision time, so a stored
/// experience stays valid no matter how far the live window has advanced
/// since.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state_before: State,
    pub action: Action,
    pub reward: f32,
    pub state_after: State,
    /// True when this was the last decision the episode allowed
    pub terminal: bool,
}

/// Bounded FIFO buffer of [`Experience`] records
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    buffer: VecDeque<Experience>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an experience, evicting the oldest once full
    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    /// Sample `batch_size` distinct experiences uniformly at random
    ///
    /// Fails with [`QtraderError::InsufficientMemory`] when the buffer holds
    /// fewer experiences than requested.
    pub fn sample<'a, R: Rng + ?Sized>(
        &'a self,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<Vec<&'a Experience>> {
        if batch_size > self.buffer.len() {
            return Err(QtraderError::InsufficientMemory {
                requested: batch_size,
                available: self.buffer.len(),
            });
        }
        let mut indices: Vec<usize> = (0..self.buffer.len()).collect();
        indices.shuffle(rng);
        Ok(indices
            .into_iter()
            .take(batch_size)
            .map(|i| &self.buffer[i])
            .collect())
    }

    /// Stored experiences, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Experience> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
