//! Action-value models

pub mod dense;

pub use dense::{Activation, DenseLayer, DenseModel};

use crate::core::{ActionValues, State};
use crate::error::Result;

/// Anything that can value actions in a state and learn from targets
///
/// `predict` must be side-effect free; the episode loop calls it freely for
/// decisions and replay targets. `fit` performs one gradient step and
/// reports the loss against `target` before the step.
pub trait ValueModel {
    fn predict(&self, state: &State) -> Result<ActionValues>;
    fn fit(&mut self, state: &State, target: &ActionValues) -> Result<f32>;
}
