//! Feature normalization
//!
//! Column-wise standard scaling, fitted once on the training split and
//! reused unchanged for evaluation runs. Columns are keyed by name and kept
//! in sorted order, so a fitted scaler and a data source agree on layout no
//! matter which order either was configured in.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{QtraderError, Result};

/// Column-wise `(x - mean) / std` transform
///
/// Means and deviations are stored per column, sorted by column name.
/// Deviations use the population formula. A zero-variance column scales by
/// 1.0 so constant features land on zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    columns: Vec<String>,
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl StandardScaler {
    /// Fit over `rows`, where each row lists its values in `columns` order
    ///
    /// Columns are re-sorted by name internally; the permutation carries the
    /// fitted parameters along, so [`StandardScaler::transform`] always
    /// expects values in the sorted order.
    pub fn fit(columns: &[String], rows: &[Vec<f64>]) -> Result<Self> {
        if columns.is_empty() {
            return Err(QtraderError::Data("cannot fit a scaler on zero columns".into()));
        }
        if rows.is_empty() {
            return Err(QtraderError::Data("cannot fit a scaler on zero rows".into()));
        }
        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(QtraderError::Data(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    columns.len()
                )));
            }
        }

        let mut order: Vec<usize> = (0..columns.len()).collect();
        order.sort_by(|&a, &b| columns[a].cmp(&columns[b]));

        let n = rows.len() as f64;
        let mut sorted_columns = Vec::with_capacity(columns.len());
        let mut mean = Vec::with_capacity(columns.len());
        let mut std = Vec::with_capacity(columns.len());
        for &col in &order {
            let m = rows.iter().map(|row| row[col]).sum::<f64>() / n;
            let var = rows.iter().map(|row| (row[col] - m).powi(2)).sum::<f64>() / n;
            let s = var.sqrt();
            sorted_columns.push(columns[col].clone());
            mean.push(m);
            std.push(if s > 0.0 { s } else { 1.0 });
        }

        let scaler = Self {
            columns: sorted_columns,
            mean,
            std,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Pass-through scaler: zero mean, unit deviation per column
    pub fn identity(mut columns: Vec<String>) -> Self {
        columns.sort();
        let n = columns.len();
        Self {
            columns,
            mean: vec![0.0; n],
            std: vec![1.0; n],
        }
    }

    /// Fitted column names, sorted
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of fitted columns
    pub fn feature_count(&self) -> usize {
        self.columns.len()
    }

    /// Verify a data source's feature layout matches the fitted one
    pub fn check_columns(&self, provided: &[String]) -> Result<()> {
        if self.columns != provided {
            return Err(QtraderError::FeatureMismatch {
                expected: self.columns.clone(),
                provided: provided.to_vec(),
            });
        }
        Ok(())
    }

    /// Normalize one row of values given in fitted column order
    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.columns.len() {
            return Err(QtraderError::Data(format!(
                "expected {} feature values, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(self.std.iter()))
            .map(|(v, (m, s))| (v - m) / s)
            .collect())
    }

    /// Load a previously fitted scaler from JSON
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let scaler: Self = serde_json::from_str(&raw)?;
        scaler.validate()?;
        Ok(scaler)
    }

    /// Write the fitted parameters as JSON
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        info!(
            "Saved scaler ({} columns) to {}",
            self.columns.len(),
            path.display()
        );
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(QtraderError::Data("scaler has no columns".into()));
        }
        if self.mean.len() != self.columns.len() || self.std.len() != self.columns.len() {
            return Err(QtraderError::Data(
                "scaler parameter lengths disagree with column count".into(),
            ));
        }
        if !self.columns.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(QtraderError::Data(
                "scaler columns must be sorted and distinct".into(),
            ));
        }
        if self.mean.iter().any(|m| !m.is_finite())
            || self.std.iter().any(|s| !s.is_finite() || *s <= 0.0)
        {
            return Err(QtraderError::Data(
                "scaler parameters must be finite with positive deviations".into(),
            ));
        }
        Ok(())
    }
}
