//! Replay memory

pub mod replay;

pub use replay::{Experience, ReplayBuffer, DEFAULT_CAPACITY};
