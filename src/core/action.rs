//! Action Space
//!
//! The discrete action space for the Q-learning agent. Index order matches
//! the model's output head: buy, sell, hold.

use serde::{Deserialize, Serialize};

/// Number of discrete actions
pub const NUM_ACTIONS: usize = 3;

/// Predicted action-values, one per action in index order
pub type ActionValues = [f32; NUM_ACTIONS];

/// Discrete action space for the DQN-style agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Action {
    /// Buy a single share at the current close
    Buy = 0,
    /// Sell the oldest held share at the current close
    Sell = 1,
    /// Do nothing
    Hold = 2,
}

impl Action {
    /// Convert from action index
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Buy),
            1 => Some(Self::Sell),
            2 => Some(Self::Hold),
            _ => None,
        }
    }

    /// Convert to action index
    pub fn to_index(self) -> usize {
        self as usize
    }

    /// Get all possible actions
    pub fn all() -> &'static [Action] {
        &[Self::Buy, Self::Sell, Self::Hold]
    }

    /// Index of the highest-valued action, first on ties
    pub fn argmax(values: &ActionValues) -> Self {
        let mut best = 0;
        for (i, v) in values.iter().enumerate() {
            if *v > values[best] {
                best = i;
            }
        }
        // best is always < NUM_ACTIONS
        Self::from_index(best).unwrap_or(Self::Hold)
    }

    /// Label used in log output
    pub fn label(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
        }
    }
}

impl Default for Action {
    fn default() -> Self {
        Self::Hold
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_roundtrip() {
        for action in Action::all() {
            let index = action.to_index();
            let recovered = Action::from_index(index).unwrap();
            assert_eq!(*action, recovered);
        }
    }

    #[test]
    fn test_from_index_out_of_range() {
        assert_eq!(Action::from_index(NUM_ACTIONS), None);
    }

    #[test]
    fn test_argmax_picks_highest() {
        assert_eq!(Action::argmax(&[0.1, 0.9, 0.3]), Action::Sell);
        assert_eq!(Action::argmax(&[2.0, -1.0, 1.0]), Action::Buy);
        assert_eq!(Action::argmax(&[-0.5, -0.2, -0.1]), Action::Hold);
    }

    #[test]
    fn test_argmax_ties_take_first() {
        assert_eq!(Action::argmax(&[1.0, 1.0, 1.0]), Action::Buy);
        assert_eq!(Action::argmax(&[0.0, 0.5, 0.5]), Action::Sell);
    }
}
