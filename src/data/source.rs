//! Tick history sources
//!
//! Where episode data comes from and how a history is split into a training
//! prefix and a held-out test suffix. A source hands out a fresh
//! oldest-first pass on every call, so each episode replays the same
//! history from the top.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::data::tick::Tick;
use crate::error::{QtraderError, Result};

const DATE_COLUMN: &str = "date";
const CLOSE_COLUMN: &str = "close";
const CHANGE_COLUMN: &str = "change";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A replayable, chronologically ordered tick history
pub trait TickSource {
    /// Instrument the ticks belong to
    fn symbol(&self) -> &str;

    /// Feature column names, in the order each tick's features are laid out
    fn feature_fields(&self) -> &[String];

    /// A fresh pass over the full history, oldest tick first
    fn ticks(&self) -> Box<dyn Iterator<Item = &Tick> + '_>;

    /// Number of ticks a pass yields
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Split into a training prefix and a test suffix
    ///
    /// The test split takes the most recent `test_fraction` of the history,
    /// rounded to the nearest tick; training gets everything before it.
    fn split(&self, test_fraction: f64) -> (MemoryTickSource, MemoryTickSource) {
        let all: Vec<Tick> = self.ticks().cloned().collect();
        let train_len = ((all.len() as f64) * (1.0 - test_fraction)).round() as usize;
        let train_len = train_len.min(all.len());
        let (train, test) = all.split_at(train_len);
        (
            MemoryTickSource::new(self.symbol(), self.feature_fields().to_vec(), train.to_vec()),
            MemoryTickSource::new(self.symbol(), self.feature_fields().to_vec(), test.to_vec()),
        )
    }
}

/// In-memory source, the common currency between loaders and splits
#[derive(Debug, Clone)]
pub struct MemoryTickSource {
    symbol: String,
    fields: Vec<String>,
    ticks: Vec<Tick>,
}

impl MemoryTickSource {
    pub fn new(symbol: impl Into<String>, fields: Vec<String>, ticks: Vec<Tick>) -> Self {
        Self {
            symbol: symbol.into(),
            fields,
            ticks,
        }
    }
}

impl TickSource for MemoryTickSource {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn feature_fields(&self) -> &[String] {
        &self.fields
    }

    fn ticks(&self) -> Box<dyn Iterator<Item = &Tick> + '_> {
        Box::new(self.ticks.iter())
    }

    fn len(&self) -> usize {
        self.ticks.len()
    }
}

/// CSV-backed source
///
/// The whole file is parsed up front and episodes replay the in-memory
/// rows. Columns are resolved by header name, so their order in the file
/// does not matter. Rows that fail to parse are skipped with a warning
/// instead of aborting the load; a missing required column is fatal.
#[derive(Debug, Clone)]
pub struct CsvTickSource {
    symbol: String,
    fields: Vec<String>,
    ticks: Vec<Tick>,
}

impl CsvTickSource {
    /// Load `path`, extracting `fields` as the feature columns
    ///
    /// `date`, `close` and `change` are required alongside the configured
    /// feature columns. Ticks are sorted by date after the load. The symbol
    /// is taken from the file stem.
    pub fn load(path: &Path, fields: &[String]) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let symbol = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string());

        let header = match lines.next() {
            Some(line) => line?,
            None => {
                return Err(QtraderError::Data(format!("{} is empty", path.display())));
            }
        };
        let names: Vec<String> = header.split(',').map(|n| n.trim().to_string()).collect();
        let find = |name: &str| -> Result<usize> {
            names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| QtraderError::MissingColumn(name.to_string()))
        };
        let date_col = find(DATE_COLUMN)?;
        let close_col = find(CLOSE_COLUMN)?;
        let change_col = find(CHANGE_COLUMN)?;
        let feature_cols = fields
            .iter()
            .map(|f| find(f))
            .collect::<Result<Vec<usize>>>()?;

        let mut ticks = Vec::new();
        for (i, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split(',').map(str::trim).collect();
            if parts.len() != names.len() {
                warn!(
                    "Skipping malformed line {}: expected {} columns, got {}",
                    i + 1,
                    names.len(),
                    parts.len()
                );
                continue;
            }
            match parse_row(&parts, &names, date_col, close_col, change_col, &feature_cols) {
                Ok(tick) => ticks.push(tick),
                Err(reason) => warn!("Skipping malformed line {}: {}", i + 1, reason),
            }
        }

        ticks.sort_by_key(|t| t.date);
        info!(
            "Loaded {} ticks for {} from {}",
            ticks.len(),
            symbol,
            path.display()
        );
        Ok(Self {
            symbol,
            fields: fields.to_vec(),
            ticks,
        })
    }
}

impl TickSource for CsvTickSource {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn feature_fields(&self) -> &[String] {
        &self.fields
    }

    fn ticks(&self) -> Box<dyn Iterator<Item = &Tick> + '_> {
        Box::new(self.ticks.iter())
    }

    fn len(&self) -> usize {
        self.ticks.len()
    }
}

fn parse_row(
    parts: &[&str],
    names: &[String],
    date_col: usize,
    close_col: usize,
    change_col: usize,
    feature_cols: &[usize],
) -> std::result::Result<Tick, String> {
    let date = NaiveDate::parse_from_str(parts[date_col], DATE_FORMAT)
        .map_err(|e| format!("bad date {:?}: {}", parts[date_col], e))?;
    let close = parse_value(parts[close_col], &names[close_col])?;
    let change = parse_value(parts[change_col], &names[change_col])?;
    let mut features = Vec::with_capacity(feature_cols.len());
    for &col in feature_cols {
        features.push(parse_value(parts[col], &names[col])?);
    }
    Ok(Tick {
        date,
        close,
        change,
        features,
    })
}

fn parse_value(raw: &str, column: &str) -> std::result::Result<f64, String> {
    raw.parse::<f64>()
        .map_err(|_| format!("bad {} value {:?}", column, raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn write_csv(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INTC.csv");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_resolves_columns_by_header_name() {
        let (_dir, path) = write_csv(
            "close,change,date,vol\n\
             10.0,0.5,2019-01-02,100\n\
             11.0,1.0,2019-01-03,200\n",
        );
        let source = CsvTickSource::load(&path, &fields(&["vol", "change"])).unwrap();

        assert_eq!(source.symbol(), "INTC");
        assert_eq!(source.len(), 2);
        let ticks: Vec<&Tick> = source.ticks().collect();
        assert_eq!(ticks[0].close, 10.0);
        assert_eq!(ticks[0].change, 0.5);
        assert_eq!(ticks[0].features, vec![100.0, 0.5]);
    }

    #[test]
    fn test_load_skips_malformed_rows() {
        let (_dir, path) = write_csv(
            "date,close,change\n\
             2019-01-02,10.0,0.5\n\
             2019-01-03,oops,0.5\n\
             2019-01-04,12.0\n\
             not-a-date,13.0,0.5\n\
             2019-01-06,14.0,0.5\n",
        );
        let source = CsvTickSource::load(&path, &fields(&["change"])).unwrap();
        assert_eq!(source.len(), 2);
        let closes: Vec<f64> = source.ticks().map(|t| t.close).collect();
        assert_eq!(closes, vec![10.0, 14.0]);
    }

    #[test]
    fn test_load_missing_column_is_fatal() {
        let (_dir, path) = write_csv("date,close\n2019-01-02,10.0\n");
        let err = CsvTickSource::load(&path, &fields(&[])).unwrap_err();
        assert!(matches!(err, QtraderError::MissingColumn(c) if c == "change"));

        let (_dir, path) = write_csv("date,close,change\n2019-01-02,10.0,0.1\n");
        let err = CsvTickSource::load(&path, &fields(&["vwap"])).unwrap_err();
        assert!(matches!(err, QtraderError::MissingColumn(c) if c == "vwap"));
    }

    #[test]
    fn test_load_sorts_by_date() {
        let (_dir, path) = write_csv(
            "date,close,change\n\
             2019-01-04,12.0,0.0\n\
             2019-01-02,10.0,0.0\n\
             2019-01-03,11.0,0.0\n",
        );
        let source = CsvTickSource::load(&path, &fields(&["change"])).unwrap();
        let closes: Vec<f64> = source.ticks().map(|t| t.close).collect();
        assert_eq!(closes, vec![10.0, 11.0, 12.0]);
    }

    #[test]
    fn test_load_tolerates_header_only_file() {
        let (_dir, path) = write_csv("date,close,change\n");
        let source = CsvTickSource::load(&path, &fields(&["change"])).unwrap();
        assert!(source.is_empty());
    }

    #[test]
    fn test_load_rejects_empty_file() {
        let (_dir, path) = write_csv("");
        assert!(CsvTickSource::load(&path, &fields(&["change"])).is_err());
    }

    fn memory_source(closes: &[f64]) -> MemoryTickSource {
        let ticks = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Tick {
                date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap() + chrono::Days::new(i as u64),
                close,
                change: 0.0,
                features: vec![close],
            })
            .collect();
        MemoryTickSource::new("TEST", fields(&["close"]), ticks)
    }

    #[test]
    fn test_split_takes_most_recent_suffix_for_test() {
        let source = memory_source(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        let (train, test) = source.split(0.4);

        assert_eq!(train.len(), 6);
        assert_eq!(test.len(), 4);
        let train_closes: Vec<f64> = train.ticks().map(|t| t.close).collect();
        let test_closes: Vec<f64> = test.ticks().map(|t| t.close).collect();
        assert_eq!(train_closes, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(test_closes, vec![7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_split_rounds_to_nearest_tick() {
        // 5 * 0.75 = 3.75 rounds to 4
        let source = memory_source(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let (train, test) = source.split(0.25);
        assert_eq!(train.len(), 4);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn test_split_carries_symbol_and_fields() {
        let source = memory_source(&[1.0, 2.0]);
        let (train, _) = source.split(0.5);
        assert_eq!(train.symbol(), "TEST");
        assert_eq!(train.feature_fields(), &fields(&["close"])[..]);
    }

    #[test]
    fn test_each_pass_starts_from_the_top() {
        let source = memory_source(&[1.0, 2.0, 3.0]);
        let first: Vec<f64> = source.ticks().map(|t| t.close).collect();
        let second: Vec<f64> = source.ticks().map(|t| t.close).collect();
        assert_eq!(first, second);
    }
}
