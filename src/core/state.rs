//! State Window
//!
//! The rolling observation matrix fed to the model: `window_length` rows of
//! normalized tick features plus three portfolio context columns. Row 0 is
//! always the newest tick; advancing shifts each row down one slot and the
//! oldest falls off the bottom.

use serde::{Deserialize, Serialize};

use crate::data::{StandardScaler, Tick};
use crate::error::Result;
use crate::portfolio::Ledger;

/// Portfolio context columns appended to each row: can_buy, can_sell,
/// squashed cash ratio
pub const CONTEXT_FEATURES: usize = 3;

/// One observation matrix, `window × dims` row-major with the newest row
/// first
///
/// States handed out by [`StateWindow::observe`] are owned copies. Replay
/// memory keeps them for the rest of a run, so they must never alias the
/// live window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    values: Vec<f32>,
    window: usize,
    dims: usize,
}

impl State {
    /// All-zero matrix of the given shape
    pub fn zeros(window: usize, dims: usize) -> Self {
        Self {
            values: vec![0.0; window * dims],
            window,
            dims,
        }
    }

    /// Matrix from row-major values, newest row first
    ///
    /// Panics when `values` does not hold exactly `window * dims` entries.
    pub fn from_values(values: Vec<f32>, window: usize, dims: usize) -> Self {
        assert_eq!(values.len(), window * dims, "state shape mismatch");
        Self {
            values,
            window,
            dims,
        }
    }

    /// Number of rows (ticks) in the matrix
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of columns per row
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Flat row-major view, newest row first
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Single row, 0 = newest
    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.dims;
        &self.values[start..start + self.dims]
    }

    /// Iterate rows from newest to oldest
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks_exact(self.dims)
    }
}

/// Rolling window over the most recent ticks
///
/// Starts zero-filled; the caller is responsible for feeding it
/// `window_length` ticks before treating its contents as meaningful.
#[derive(Debug, Clone)]
pub struct StateWindow {
    state: State,
    feature_count: usize,
}

impl StateWindow {
    /// Create a zero-filled window for `feature_count` normalized features
    /// per tick
    pub fn new(window_length: usize, feature_count: usize) -> Self {
        Self {
            state: State::zeros(window_length, feature_count + CONTEXT_FEATURES),
            feature_count,
        }
    }

    /// Advance the window with one tick and the portfolio as it stands
    ///
    /// Returns the state as it stood before this tick together with the
    /// state including it, both independent snapshots. The new row holds the
    /// scaler-normalized features followed by the buy/sell availability
    /// flags at the tick's close and the sigmoid-squashed ratio of cash to
    /// starting cash.
    pub fn observe(
        &mut self,
        tick: &Tick,
        scaler: &StandardScaler,
        ledger: &Ledger,
    ) -> Result<(State, State)> {
        let previous = self.state.clone();

        let dims = self.state.dims;
        let window = self.state.window;
        if window > 1 {
            self.state
                .values
                .copy_within(0..(window - 1) * dims, dims);
        }

        let normalized = scaler.transform(&tick.features)?;
        debug_assert_eq!(normalized.len(), self.feature_count);
        let row = &mut self.state.values[0..dims];
        for (slot, value) in row.iter_mut().zip(normalized.iter()) {
            *slot = *value as f32;
        }
        row[self.feature_count] = if ledger.can_buy(tick.close) { 1.0 } else { 0.0 };
        row[self.feature_count + 1] = if ledger.can_sell() { 1.0 } else { 0.0 };
        row[self.feature_count + 2] = sigmoid(ledger.cash() / ledger.starting_cash()) as f32;

        Ok((previous, self.state.clone()))
    }

    /// The live window contents
    pub fn state(&self) -> &State {
        &self.state
    }
}

/// Numerically stable logistic function
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}
