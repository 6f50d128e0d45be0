use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Snapshot of the running estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Production steps taken so far across both ensembles.
    pub step_count: u64,
    /// Ratio estimate at the calibrated bias.
    pub ratio: f64,
    /// Standard error of `ratio`.
    pub error: f64,
}

/// Receiver of periodic progress records.
pub trait ProgressSink {
    /// Handles one record.
    fn report(&mut self, record: ProgressRecord);
}

impl ProgressSink for Vec<ProgressRecord> {
    fn report(&mut self, record: ProgressRecord) {
        self.push(record);
    }
}

/// Collects progress records for CSV export.
#[derive(Debug, Default, Clone)]
pub struct ProgressRecorder {
    records: Vec<ProgressRecord>,
}

impl ProgressRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records seen so far.
    pub fn records(&self) -> &[ProgressRecord] {
        &self.records
    }

    /// Most recent record.
    pub fn last(&self) -> Option<&ProgressRecord> {
        self.records.last()
    }

    /// Writes the records to a CSV file.
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        writeln!(file, "step_count,ratio,error")?;
        for record in &self.records {
            writeln!(
                file,
                "{},{:.10e},{:.6e}",
                record.step_count, record.ratio, record.error
            )?;
        }
        Ok(())
    }
}

impl ProgressSink for ProgressRecorder {
    fn report(&mut self, record: ProgressRecord) {
        self.records.push(record);
    }
}
