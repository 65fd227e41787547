//! Run artifacts
//!
//! What a run leaves behind besides the model itself: per-fit training
//! rows, per-decision action values and per-tick portfolio rows, plus the
//! CSV writers that put them on disk for offline inspection.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::core::{Action, ActionValues};
use crate::error::Result;
use crate::training::episode::EpisodeRun;

/// One row per replay fit
///
/// `epsilon`, `cash` and `shares` are the live values at the moment the fit
/// ran, not at the moment the replayed experience was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct FitRecord {
    pub loss: f32,
    pub reward: f32,
    pub epsilon: f64,
    pub cash: f64,
    pub shares: usize,
}

/// One row per acting tick of an evaluation run
///
/// `value` is the portfolio marked at this tick's close before the action;
/// `shares`, `cash` and `profits` are taken after it.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    pub value: f64,
    pub action: Action,
    pub shares: usize,
    pub cash: f64,
    pub profits: f64,
    pub close: f64,
}

/// Everything a training run accumulates across its episodes
#[derive(Debug, Default)]
pub struct TrainingReport {
    pub fits: Vec<FitRecord>,
    pub action_values: Vec<ActionValues>,
    pub episodes: Vec<EpisodeRun>,
}

impl TrainingReport {
    /// Write the fit log and the action-value log as timestamped CSVs
    ///
    /// Returns the paths written. A missing directory skips the files with
    /// a warning instead of failing the run.
    pub fn save_csv(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        let fit_rows = self.fits.iter().map(|f| {
            format!(
                "{},{},{},{},{}",
                f.loss, f.reward, f.epsilon, f.cash, f.shares
            )
        });
        if let Some(path) = write_rows(dir, "training_log", "loss,reward,epsilon,cash,shares", fit_rows)? {
            written.push(path);
        }
        let value_rows = self
            .action_values
            .iter()
            .map(|v| format!("{},{},{}", v[0], v[1], v[2]));
        if let Some(path) = write_rows(dir, "action_values", "buy,sell,hold", value_rows)? {
            written.push(path);
        }
        Ok(written)
    }
}

/// Per-tick rows and the outcome of one evaluation episode
#[derive(Debug)]
pub struct EvaluationReport {
    pub rows: Vec<TickRecord>,
    pub run: EpisodeRun,
}

impl EvaluationReport {
    /// Write the portfolio log as a timestamped CSV under `dir`
    ///
    /// `name` distinguishes runs, e.g. "test_log" or "random_log". Actions
    /// are written as their indices.
    pub fn save_csv(&self, dir: &Path, name: &str) -> Result<Option<PathBuf>> {
        let rows = self.rows.iter().map(|r| {
            format!(
                "{},{},{},{},{},{}",
                r.value,
                r.action.to_index(),
                r.shares,
                r.cash,
                r.profits,
                r.close
            )
        });
        write_rows(dir, name, "value,action,shares,cash,profits,close", rows)
    }
}

/// Write one timestamped CSV, skipping with a warning when `dir` is missing
fn write_rows(
    dir: &Path,
    name: &str,
    header: &str,
    rows: impl Iterator<Item = String>,
) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        warn!("{} is not a directory, {} not saved", dir.display(), name);
        return Ok(None);
    }
    let path = dir.join(format!("{}_{}.csv", name, Local::now().format("%Y-%m-%d_%H-%M")));
    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "{}", header)?;
    let mut count = 0usize;
    for row in rows {
        writeln!(writer, "{}", row)?;
        count += 1;
    }
    writer.flush()?;
    info!("Created {} ({} rows)", path.display(), count);
    Ok(Some(path))
}
