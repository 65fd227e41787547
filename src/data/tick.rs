//! Daily tick record
//!
//! One row of an instrument's history. The close is kept in raw account
//! currency for portfolio arithmetic; `features` carries the columns the
//! model consumes, laid out in the owning source's field order.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One trading day of a single instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Trading date; sources yield ticks oldest first
    pub date: NaiveDate,
    /// Closing price, never normalized
    pub close: f64,
    /// Day-over-day close change
    pub change: f64,
    /// Feature values in the source's `feature_fields` order
    pub features: Vec<f64>,
}
