pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod memory;
pub mod model;
pub mod portfolio;
pub mod training;

pub use config::AppConfig;
pub use core::{Action, ActionValues, RewardMode, State, StateWindow, NUM_ACTIONS};
pub use data::{CsvTickSource, MemoryTickSource, StandardScaler, Tick, TickSource};
pub use error::{QtraderError, Result};
pub use memory::{Experience, ReplayBuffer};
pub use model::{DenseModel, ValueModel};
pub use portfolio::{Ledger, TradeOutcome};
pub use training::{
    run_policy_test, run_random_test, EpisodeConfig, EpisodeRun, EpisodeStatus, EvaluationReport,
    TrainingReport, TrainingSession,
};
