//! Reward Shaping
//!
//! Converts ledger outcomes into the scalar training signal. Rewards are
//! flat bands keyed on the trade outcome, not raw PnL.

use serde::{Deserialize, Serialize};

use crate::portfolio::TradeOutcome;

/// Realized profit above this earns the large sell reward
pub const BIG_PROFIT_THRESHOLD: f64 = 10.0;

/// Reward for a sell clearing [`BIG_PROFIT_THRESHOLD`]
pub const REWARD_BIG_PROFIT: f32 = 2.0;

/// Reward for a sell with non-negative profit up to the threshold
pub const REWARD_SMALL_PROFIT: f32 = 1.0;

/// Penalty for a sell that realized a loss
pub const REWARD_LOSS: f32 = -0.5;

/// Penalty for a buy or sell whose precondition failed
pub const REWARD_FAILED_ATTEMPT: f32 = -0.1;

/// Whether shaped rewards are produced or suppressed
///
/// `Disabled` zeroes every reward while the ledger still executes trades;
/// it exists to collect an untrained baseline trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardMode {
    Disabled,
    Enabled,
}

impl Default for RewardMode {
    fn default() -> Self {
        Self::Enabled
    }
}

impl RewardMode {
    /// Scalar reward for one applied action
    ///
    /// A failed attempt is penalized at a flat [`REWARD_FAILED_ATTEMPT`]
    /// regardless of which action failed; a successful hold and a successful
    /// buy are both worth zero. Only a completed sell pays out, banded by
    /// realized profit, with exactly-threshold profit in the small band.
    pub fn reward(&self, outcome: &TradeOutcome) -> f32 {
        match self {
            Self::Disabled => 0.0,
            Self::Enabled => match outcome {
                TradeOutcome::Bought { .. } => 0.0,
                TradeOutcome::Sold { profit, .. } => {
                    if *profit > BIG_PROFIT_THRESHOLD {
                        REWARD_BIG_PROFIT
                    } else if *profit >= 0.0 {
                        REWARD_SMALL_PROFIT
                    } else {
                        REWARD_LOSS
                    }
                }
                TradeOutcome::Held => 0.0,
                TradeOutcome::Rejected { .. } => REWARD_FAILED_ATTEMPT,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Action;

    fn sold(profit: f64) -> TradeOutcome {
        TradeOutcome::Sold {
            price: 100.0,
            profit,
        }
    }

    #[test]
    fn test_sell_reward_bands() {
        let mode = RewardMode::Enabled;
        assert_eq!(mode.reward(&sold(10.01)), REWARD_BIG_PROFIT);
        assert_eq!(mode.reward(&sold(11.0)), REWARD_BIG_PROFIT);
        assert_eq!(mode.reward(&sold(0.0)), REWARD_SMALL_PROFIT);
        assert_eq!(mode.reward(&sold(9.99)), REWARD_SMALL_PROFIT);
        assert_eq!(mode.reward(&sold(-0.01)), REWARD_LOSS);
        assert_eq!(mode.reward(&sold(-50.0)), REWARD_LOSS);
    }

    #[test]
    fn test_profit_exactly_at_threshold_is_small_band() {
        assert_eq!(
            RewardMode::Enabled.reward(&sold(BIG_PROFIT_THRESHOLD)),
            REWARD_SMALL_PROFIT
        );
    }

    #[test]
    fn test_failed_attempts_share_one_penalty() {
        let mode = RewardMode::Enabled;
        let failed_buy = TradeOutcome::Rejected { action: Action::Buy };
        let failed_sell = TradeOutcome::Rejected {
            action: Action::Sell,
        };
        assert_eq!(mode.reward(&failed_buy), REWARD_FAILED_ATTEMPT);
        assert_eq!(mode.reward(&failed_sell), REWARD_FAILED_ATTEMPT);
    }

    #[test]
    fn test_buy_and_hold_are_neutral() {
        let mode = RewardMode::Enabled;
        assert_eq!(mode.reward(&TradeOutcome::Bought { price: 10.0 }), 0.0);
        assert_eq!(mode.reward(&TradeOutcome::Held), 0.0);
    }

    #[test]
    fn test_disabled_mode_zeroes_everything() {
        let mode = RewardMode::Disabled;
        assert_eq!(mode.reward(&sold(100.0)), 0.0);
        assert_eq!(mode.reward(&sold(-100.0)), 0.0);
        assert_eq!(
            mode.reward(&TradeOutcome::Rejected { action: Action::Buy }),
            0.0
        );
        assert_eq!(mode.reward(&TradeOutcome::Held), 0.0);
    }
}
