//! Market data: tick records, sources and feature normalization

pub mod scaler;
pub mod source;
pub mod tick;

pub use scaler::StandardScaler;
pub use source::{CsvTickSource, MemoryTickSource, TickSource};
pub use tick::Tick;
