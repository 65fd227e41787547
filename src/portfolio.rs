//! Portfolio Ledger
//!
//! Single-symbol bookkeeping: cash, a FIFO queue of per-share purchase
//! prices, and a realized-profit accumulator. Trades move exactly one share
//! at the current close. Rejected attempts leave the ledger untouched but
//! are reported so the reward model can distinguish them from a hold.

use std::collections::VecDeque;

use crate::core::Action;

/// Outcome of applying one action at a tick price
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeOutcome {
    /// One share bought at `price`
    Bought { price: f64 },
    /// Oldest lot sold at `price`, realizing `profit` against its basis
    Sold { price: f64, profit: f64 },
    /// Hold, ledger unchanged
    Held,
    /// Precondition failed, ledger unchanged
    Rejected { action: Action },
}

impl TradeOutcome {
    /// Whether the attempted action actually moved the ledger
    pub fn executed(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Cash and share bookkeeping for a single symbol
///
/// Shares are held as individual lots in purchase order. A sell always
/// closes the oldest lot, so realized profit is measured against the
/// longest-held share.
#[derive(Debug, Clone)]
pub struct Ledger {
    cash: f64,
    starting_cash: f64,
    // Purchase price per share, oldest at the front
    lots: VecDeque<f64>,
    realized_profit: f64,
}

impl Ledger {
    /// Create a ledger with starting cash and share count
    ///
    /// Pre-existing shares have no recorded purchase price and enter the
    /// queue at a zero basis, so selling one realizes the full sale price.
    pub fn new(starting_cash: f64, starting_shares: u32) -> Self {
        Self {
            cash: starting_cash,
            starting_cash,
            lots: (0..starting_shares).map(|_| 0.0).collect(),
            realized_profit: 0.0,
        }
    }

    /// Apply one action at the given price
    ///
    /// A buy requires cash strictly above the price (equality is a
    /// rejection); a sell requires at least one held share. Neither
    /// precondition failing changes any balance.
    pub fn apply(&mut self, action: Action, price: f64) -> TradeOutcome {
        match action {
            Action::Buy => {
                if self.cash > price {
                    self.cash -= price;
                    self.lots.push_back(price);
                    TradeOutcome::Bought { price }
                } else {
                    TradeOutcome::Rejected { action }
                }
            }
            Action::Sell => match self.lots.pop_front() {
                Some(basis) => {
                    self.cash += price;
                    let profit = price - basis;
                    self.realized_profit += profit;
                    TradeOutcome::Sold { price, profit }
                }
                None => TradeOutcome::Rejected { action },
            },
            Action::Hold => TradeOutcome::Held,
        }
    }

    /// Whether a buy at `price` would succeed
    pub fn can_buy(&self, price: f64) -> bool {
        self.cash > price
    }

    /// Whether a sell would succeed
    pub fn can_sell(&self) -> bool {
        !self.lots.is_empty()
    }

    /// Mark-to-market portfolio value at `price`
    pub fn value(&self, price: f64) -> f64 {
        self.shares() as f64 * price + self.cash
    }

    /// True when no action can change the portfolio: cash below the price
    /// and nothing held to sell
    pub fn is_depleted(&self, price: f64) -> bool {
        self.cash < price && self.lots.is_empty()
    }

    /// Current cash balance
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Cash the ledger was opened with
    pub fn starting_cash(&self) -> f64 {
        self.starting_cash
    }

    /// Number of shares currently held
    pub fn shares(&self) -> usize {
        self.lots.len()
    }

    /// Sum of realized profits and losses over the ledger's lifetime
    pub fn realized_profit(&self) -> f64 {
        self.realized_profit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_moves_cash_into_lot() {
        let mut ledger = Ledger::new(100.0, 0);
        let outcome = ledger.apply(Action::Buy, 30.0);
        assert_eq!(outcome, TradeOutcome::Bought { price: 30.0 });
        assert_eq!(ledger.cash(), 70.0);
        assert_eq!(ledger.shares(), 1);
    }

    #[test]
    fn test_buy_requires_cash_strictly_above_price() {
        let mut ledger = Ledger::new(50.0, 0);
        let outcome = ledger.apply(Action::Buy, 50.0);
        assert_eq!(outcome, TradeOutcome::Rejected { action: Action::Buy });
        assert_eq!(ledger.cash(), 50.0);
        assert_eq!(ledger.shares(), 0);
    }

    #[test]
    fn test_sell_without_shares_is_rejected() {
        let mut ledger = Ledger::new(100.0, 0);
        let outcome = ledger.apply(Action::Sell, 10.0);
        assert_eq!(
            outcome,
            TradeOutcome::Rejected {
                action: Action::Sell
            }
        );
        assert_eq!(ledger.cash(), 100.0);
    }

    #[test]
    fn test_sell_closes_oldest_lot_first() {
        let mut ledger = Ledger::new(100.0, 0);
        ledger.apply(Action::Buy, 10.0);
        ledger.apply(Action::Buy, 12.0);
        ledger.apply(Action::Buy, 15.0);

        let outcome = ledger.apply(Action::Sell, 20.0);
        assert_eq!(
            outcome,
            TradeOutcome::Sold {
                price: 20.0,
                profit: 10.0
            }
        );
        // Next oldest is the 12.0 lot
        let outcome = ledger.apply(Action::Sell, 20.0);
        assert_eq!(
            outcome,
            TradeOutcome::Sold {
                price: 20.0,
                profit: 8.0
            }
        );
        assert_eq!(ledger.shares(), 1);
        assert_eq!(ledger.realized_profit(), 18.0);
    }

    #[test]
    fn test_hold_changes_nothing() {
        let mut ledger = Ledger::new(100.0, 0);
        ledger.apply(Action::Buy, 10.0);
        let before_cash = ledger.cash();
        let outcome = ledger.apply(Action::Hold, 50.0);
        assert_eq!(outcome, TradeOutcome::Held);
        assert_eq!(ledger.cash(), before_cash);
        assert_eq!(ledger.shares(), 1);
    }

    #[test]
    fn test_value_marks_to_market() {
        let mut ledger = Ledger::new(100.0, 0);
        ledger.apply(Action::Buy, 10.0);
        ledger.apply(Action::Buy, 20.0);
        assert_eq!(ledger.value(25.0), 2.0 * 25.0 + 70.0);
    }

    #[test]
    fn test_depleted_needs_empty_lots_and_short_cash() {
        let mut ledger = Ledger::new(15.0, 0);
        assert!(!ledger.is_depleted(10.0));
        assert!(ledger.is_depleted(20.0));

        ledger.apply(Action::Buy, 12.0);
        // Cash is 3.0 but a share is still held
        assert!(!ledger.is_depleted(20.0));

        ledger.apply(Action::Sell, 1.0);
        assert!(ledger.is_depleted(20.0));
    }

    #[test]
    fn test_cash_never_goes_negative() {
        let mut ledger = Ledger::new(25.0, 0);
        ledger.apply(Action::Buy, 10.0);
        ledger.apply(Action::Buy, 10.0);
        // 5.0 left, next buy must fail
        let outcome = ledger.apply(Action::Buy, 10.0);
        assert!(!outcome.executed());
        assert!(ledger.cash() >= 0.0);
    }

    #[test]
    fn test_starting_shares_have_zero_basis() {
        let mut ledger = Ledger::new(100.0, 2);
        assert_eq!(ledger.shares(), 2);
        let outcome = ledger.apply(Action::Sell, 30.0);
        assert_eq!(
            outcome,
            TradeOutcome::Sold {
                price: 30.0,
                profit: 30.0
            }
        );
        assert_eq!(ledger.cash(), 130.0);
    }

    #[test]
    fn test_loss_reduces_realized_profit() {
        let mut ledger = Ledger::new(100.0, 0);
        ledger.apply(Action::Buy, 20.0);
        ledger.apply(Action::Sell, 15.0);
        assert_eq!(ledger.realized_profit(), -5.0);
    }
}
