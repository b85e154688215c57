//! Results Sink - append-only trial log
//!
//! The sink is the sole persisted artifact of the measurement phase: a UTF-8
//! CSV with header `Version,BinCount,MeasurementType,Trial,EnergyJoules`,
//! one row per trial, flushed to disk before the next invocation begins. A
//! process killed mid-sweep leaves a valid, partially complete table.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::profiler::MeasurementType;

/// Column header of the results table, in field order.
pub const HEADER: [&str; 5] = [
    "Version",
    "BinCount",
    "MeasurementType",
    "Trial",
    "EnergyJoules",
];

/// One trial's outcome: the measurement configuration plus the reading.
///
/// `energy_joules` is a non-negative float or the `NaN` sentinel marking a
/// recorded failure; both round-trip through the CSV token format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrialRecord {
    version: String,
    bin_count: u32,
    measurement_type: MeasurementType,
    trial: u32,
    energy_joules: f64,
}

impl TrialRecord {
    /// Create a new trial record.
    #[must_use]
    pub fn new(
        version: impl Into<String>,
        bin_count: u32,
        measurement_type: MeasurementType,
        trial: u32,
        energy_joules: f64,
    ) -> Self {
        Self {
            version: version.into(),
            bin_count,
            measurement_type,
            trial,
            energy_joules,
        }
    }

    /// Get the binary variant label.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the parameter value the benchmark ran with.
    #[must_use]
    pub const fn bin_count(&self) -> u32 {
        self.bin_count
    }

    /// Get the measurement strategy.
    #[must_use]
    pub const fn measurement_type(&self) -> MeasurementType {
        self.measurement_type
    }

    /// Get the 1-based trial index.
    #[must_use]
    pub const fn trial(&self) -> u32 {
        self.trial
    }

    /// Get the energy reading, `NaN` for a recorded failure.
    #[must_use]
    pub const fn energy_joules(&self) -> f64 {
        self.energy_joules
    }
}

/// Append-only writer over the results table.
pub struct ResultsSink {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl ResultsSink {
    /// Create the table at `path`, truncating any previous file, and write
    /// the header row.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be created or the header
    /// cannot be written.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&path)?;
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self { writer, path })
    }

    /// Append one trial row and flush it to durable storage before
    /// returning, so the table reflects every completed trial even if the
    /// process is terminated mid-sweep.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the flush fails; the sweep
    /// driver treats this as fatal.
    pub fn append(&mut self, record: &TrialRecord) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Path of the table being written.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Read a finished results table back into trial records.
///
/// The `NaN` token deserializes to `f64::NAN`.
///
/// # Errors
///
/// Returns an error when the file cannot be opened or a row does not match
/// the table schema.
pub fn load_table(path: impl AsRef<Path>) -> Result<Vec<TrialRecord>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
