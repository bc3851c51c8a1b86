use std::collections::BTreeSet;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Cell – a single value of an uploaded table
// ---------------------------------------------------------------------------

/// A dynamically-typed table cell. Typing happens on load; whether a column
/// is usable as a signal is only decided when it is selected.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Missing => write!(f, "<missing>"),
        }
    }
}

impl Cell {
    /// Type a raw text field: empty or non-finite (`nan`, `inf`) → missing,
    /// float-parsable → number.
    pub fn parse(raw: &str) -> Self {
        if raw.is_empty() {
            return Cell::Missing;
        }
        match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => Cell::Number(v),
            Ok(_) => Cell::Missing,
            Err(_) => Cell::Text(raw.to_string()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// TabularDataset – the parsed upload
// ---------------------------------------------------------------------------

/// One named column of an uploaded table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Cell>,
}

/// Ordered set of named columns of equal length.
///
/// Column names are unique: duplicates in the source header are renamed to
/// `name.1`, `name.2`, … on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularDataset {
    columns: Vec<Column>,
    n_rows: usize,
}

impl TabularDataset {
    /// Assemble a dataset, enforcing equal column lengths and unique names.
    pub fn from_columns(mut columns: Vec<Column>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |c| c.cells.len());
        if let Some(bad) = columns.iter().find(|c| c.cells.len() != n_rows) {
            return Err(PipelineError::MalformedUpload(format!(
                "column '{}' has {} values but the first column has {n_rows}",
                bad.name,
                bad.cells.len()
            )));
        }
        dedupe_names(&mut columns);
        Ok(Self { columns, n_rows })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Number of rows (samples per column).
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Read a column as a flat `f64` vector.
    ///
    /// Fails with `UnknownColumn` when absent and with `MalformedUpload` on
    /// the first text, missing or non-finite cell.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<f64>> {
        let column = self
            .column(name)
            .ok_or_else(|| PipelineError::UnknownColumn {
                column: name.to_string(),
                available: self.columns.iter().map(|c| c.name.clone()).collect(),
            })?;

        column
            .cells
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell.as_f64() {
                Some(v) if v.is_finite() => Ok(v),
                _ => Err(PipelineError::MalformedUpload(format!(
                    "column '{name}', row {row}: '{cell}' is not a finite number"
                ))),
            })
            .collect()
    }
}

fn dedupe_names(columns: &mut [Column]) {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    for col in columns.iter_mut() {
        if seen.contains(&col.name) {
            let base = col.name.clone();
            let mut suffix = 1;
            while seen.contains(&format!("{base}.{suffix}")) {
                suffix += 1;
            }
            col.name = format!("{base}.{suffix}");
        }
        seen.insert(col.name.clone());
    }
}

// ---------------------------------------------------------------------------
// Signal – one channel with a time axis
// ---------------------------------------------------------------------------

/// A single-channel signal sampled at a fixed rate.
///
/// Stages never mutate a signal; each returns a new one. `start_time_s` is
/// the absolute time of sample 0 (0 for a freshly built signal, the window
/// start after a crop).
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    name: String,
    values: Vec<f64>,
    sample_rate_hz: f64,
    unit: String,
    start_time_s: f64,
}

impl Signal {
    pub fn new(
        name: impl Into<String>,
        values: Vec<f64>,
        sample_rate_hz: f64,
        unit: impl Into<String>,
    ) -> Result<Self> {
        if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
            return Err(PipelineError::InvalidRate(sample_rate_hz));
        }
        Ok(Self {
            name: name.into(),
            values,
            sample_rate_hz,
            unit: unit.into(),
            start_time_s: 0.0,
        })
    }

    /// A new signal sharing this one's name, rate and unit.
    pub(crate) fn derive(&self, values: Vec<f64>, start_time_s: f64) -> Self {
        Self {
            name: self.name.clone(),
            values,
            sample_rate_hz: self.sample_rate_hz,
            unit: self.unit.clone(),
            start_time_s,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn start_time_s(&self) -> f64 {
        self.start_time_s
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn nyquist_hz(&self) -> f64 {
        self.sample_rate_hz / 2.0
    }

    #[inline]
    pub fn time_at(&self, index: usize) -> f64 {
        self.start_time_s + index as f64 / self.sample_rate_hz
    }

    /// Time of each sample in seconds.
    pub fn times(&self) -> Vec<f64> {
        (0..self.values.len()).map(|i| self.time_at(i)).collect()
    }

    pub fn last_time_s(&self) -> Option<f64> {
        self.values.len().checked_sub(1).map(|i| self.time_at(i))
    }
}

/// Select `column` from `dataset` and pair it with a sampling rate.
pub fn build(
    dataset: &TabularDataset,
    column: &str,
    sample_rate_hz: f64,
    unit: &str,
) -> Result<Signal> {
    if !dataset.contains_column(column) {
        return Err(PipelineError::UnknownColumn {
            column: column.to_string(),
            available: dataset.column_names().iter().map(|s| s.to_string()).collect(),
        });
    }
    if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
        return Err(PipelineError::InvalidRate(sample_rate_hz));
    }
    let values = dataset.numeric_column(column)?;
    if values.is_empty() {
        return Err(PipelineError::EmptySignal);
    }
    debug!(
        "built signal '{column}': {} samples at {sample_rate_hz} Hz",
        values.len()
    );
    Signal::new(column, values, sample_rate_hz, unit)
}

// ---------------------------------------------------------------------------
// Parameter types
// ---------------------------------------------------------------------------

/// Frequency edges in Hz. `None` disables that edge.
///
/// Used both as a filter band (high-pass / low-pass edges) and as an analysis
/// band (scalogram and PSD frequency range); the stages apply different
/// rules to each.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub low_hz: Option<f64>,
    pub high_hz: Option<f64>,
}

impl FrequencyBand {
    pub fn new(low_hz: Option<f64>, high_hz: Option<f64>) -> Self {
        Self { low_hz, high_hz }
    }

    pub fn between(low_hz: f64, high_hz: f64) -> Self {
        Self::new(Some(low_hz), Some(high_hz))
    }

    pub fn highpass(low_hz: f64) -> Self {
        Self::new(Some(low_hz), None)
    }

    pub fn lowpass(high_hz: f64) -> Self {
        Self::new(None, Some(high_hz))
    }
}

impl fmt::Display for FrequencyBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let edge = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |v| format!("{v}"));
        write!(f, "[{}, {}] Hz", edge(self.low_hz), edge(self.high_hz))
    }
}

/// Closed time interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_s: f64,
    pub end_s: f64,
}

impl TimeWindow {
    pub fn new(start_s: f64, end_s: f64) -> Self {
        Self { start_s, end_s }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.start_s.is_finite() && self.start_s >= 0.0) {
            return Err(PipelineError::InvalidWindow(format!(
                "start {} s must be a non-negative number",
                self.start_s
            )));
        }
        // An infinite end is fine: it is clamped to the data.
        if self.end_s.is_nan() || self.end_s <= self.start_s {
            return Err(PipelineError::InvalidWindow(format!(
                "end {} s must be after start {} s",
                self.end_s, self.start_s
            )));
        }
        Ok(())
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::new(0.0, 10.0)
    }
}
