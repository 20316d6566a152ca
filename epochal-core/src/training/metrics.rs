//! Per-epoch metrics table.

use crate::error::{ExperimentError, Result};
use crate::persistence;
use std::path::Path;

/// One recorded epoch: its index and the metric values in recording order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsRow {
    pub epoch: usize,
    pub values: Vec<(String, f64)>,
}

impl MetricsRow {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| *value)
    }
}

/// Append-only accumulator of per-epoch metrics, flushed as CSV.
///
/// Column order is fixed by the first recorded row; names first seen later
/// are appended. Recording the same epoch twice keeps both rows.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder {
    columns: Vec<String>,
    rows: Vec<MetricsRow>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row for `epoch`. A name repeated within `metrics` keeps its
    /// last value.
    pub fn record(&mut self, epoch: usize, metrics: &[(&str, f64)]) {
        let mut values: Vec<(String, f64)> = Vec::with_capacity(metrics.len());
        for &(name, value) in metrics {
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.to_string());
            }
            match values.iter_mut().find(|(key, _)| key == name) {
                Some(slot) => slot.1 = value,
                None => values.push((name.to_string(), value)),
            }
        }
        self.rows.push(MetricsRow { epoch, values });
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[MetricsRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render the accumulated table as CSV with an `epoch` column first.
    pub fn to_csv(&self) -> std::result::Result<Vec<u8>, std::io::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push("epoch");
        header.extend(self.columns.iter().map(String::as_str));
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(header.len());
            record.push(row.epoch.to_string());
            for column in &self.columns {
                record.push(row.get(column).map(|v| v.to_string()).unwrap_or_default());
            }
            writer.write_record(&record)?;
        }
        writer.into_inner().map_err(|e| e.into_error())
    }

    /// Write the full table to `path`, replacing any previous contents.
    pub fn flush(&self, path: &Path) -> Result<()> {
        let bytes = self.to_csv().map_err(|e| ExperimentError::io(path, e))?;
        persistence::atomic_write(path, &bytes)?;
        tracing::debug!(path = %path.display(), rows = self.rows.len(), "metrics flushed");
        Ok(())
    }
}
