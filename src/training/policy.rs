//! Decision strategies
//!
//! How a row of predicted action-values becomes an action. Training runs an
//! epsilon-greedy policy whose exploration rate decays linearly with every
//! decision; evaluation is pure greedy; the baseline ignores the model and
//! picks uniformly.

use rand::rngs::StdRng;
use rand::Rng;

use crate::core::{Action, ActionValues, NUM_ACTIONS};

/// A policy mapping predicted action-values to an action
///
/// `decide` may mutate internal strategy state (exploration decay), so one
/// strategy instance must live as long as the run it steers.
pub trait DecisionStrategy {
    fn decide(&mut self, values: &ActionValues, rng: &mut StdRng) -> Action;

    /// Exploration rate after the most recent decision
    fn epsilon(&self) -> f64;

    /// Whether `decide` looks at the values at all
    ///
    /// When false the caller can skip model prediction entirely.
    fn needs_values(&self) -> bool {
        true
    }
}

/// Epsilon-greedy with linear decay
///
/// Starts fully exploring; every decision lowers epsilon by `step` until it
/// reaches `floor`. The explore/exploit draw uses the rate as it stood
/// before the decision's decay.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    epsilon: f64,
    floor: f64,
    step: f64,
}

impl EpsilonGreedy {
    pub fn new(floor: f64, step: f64) -> Self {
        Self {
            epsilon: 1.0,
            floor,
            step,
        }
    }

    /// Resume from a given exploration rate
    pub fn with_epsilon(epsilon: f64, floor: f64, step: f64) -> Self {
        Self {
            epsilon,
            floor,
            step,
        }
    }
}

impl DecisionStrategy for EpsilonGreedy {
    fn decide(&mut self, values: &ActionValues, rng: &mut StdRng) -> Action {
        let explore = rng.gen::<f64>() < self.epsilon;
        self.epsilon = (self.epsilon - self.step).max(self.floor);
        if explore {
            random_action(rng)
        } else {
            Action::argmax(values)
        }
    }

    fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

/// Always takes the highest-valued action
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl DecisionStrategy for Greedy {
    fn decide(&mut self, values: &ActionValues, _rng: &mut StdRng) -> Action {
        Action::argmax(values)
    }

    fn epsilon(&self) -> f64 {
        0.0
    }
}

/// Uniform random action, never consulting the model
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRandom;

impl DecisionStrategy for UniformRandom {
    fn decide(&mut self, _values: &ActionValues, rng: &mut StdRng) -> Action {
        random_action(rng)
    }

    fn epsilon(&self) -> f64 {
        1.0
    }

    fn needs_values(&self) -> bool {
        false
    }
}

fn random_action(rng: &mut StdRng) -> Action {
    Action::from_index(rng.gen_range(0..NUM_ACTIONS)).unwrap_or_default()
}
