//! Training and evaluation
//!
//! The episode engine, the decision strategies that parameterize it, and
//! the artifacts a run leaves behind.

pub mod episode;
pub mod policy;
pub mod report;

pub use episode::{
    run_policy_test, run_random_test, EpisodeConfig, EpisodeRun, EpisodeStatus, TrainingSession,
};
pub use policy::{DecisionStrategy, EpsilonGreedy, Greedy, UniformRandom};
pub use report::{EvaluationReport, FitRecord, TickRecord, TrainingReport};
