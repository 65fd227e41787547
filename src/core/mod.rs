//! Core simulator abstractions
//!
//! Fundamental types for actions, reward shaping, and the rolling state
//! window.

pub mod action;
pub mod reward;
pub mod state;

pub use action::{Action, ActionValues, NUM_ACTIONS};
pub use reward::{
    RewardMode, BIG_PROFIT_THRESHOLD, REWARD_BIG_PROFIT, REWARD_FAILED_ATTEMPT, REWARD_LOSS,
    REWARD_SMALL_PROFIT,
};
pub use state::{State, StateWindow, CONTEXT_FEATURES};
