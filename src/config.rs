//! Sweep and profiler configuration
//!
//! Configuration is an explicit value handed to the sweep driver at
//! invocation time, never process-wide state, so independent sweeps can run
//! in one process (tests rely on this).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One benchmark binary variant: the executable path plus the label recorded
/// in the `Version` column of the results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySpec {
    /// Path to the benchmark executable
    pub path: PathBuf,
    /// Label recorded in the `Version` column
    pub label: String,
}

impl BinarySpec {
    /// Create a new binary spec.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }
}

/// The configuration space of one sweep: the cross-product of binaries,
/// parameter values, the two measurement strategies, and trial indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Benchmark binaries, in sweep order
    pub binaries: Vec<BinarySpec>,
    /// Parameter values handed to each binary, in sweep order
    pub bin_counts: Vec<u32>,
    /// Trials per (binary, parameter, strategy) cell
    pub trials: u32,
    /// Blocking pause after each trial so hardware power state settles
    /// before the next measurement
    pub cooldown: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            binaries: Vec::new(),
            bin_counts: vec![2, 4, 8, 16, 32, 64],
            trials: 5,
            cooldown: Duration::from_secs(1),
        }
    }
}

impl SweepConfig {
    /// Check the configuration for faults that would make every trial
    /// meaningless.
    ///
    /// Called by the sweep driver before any trial runs; no partial table is
    /// written when this fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingBinary`] when a configured executable does
    /// not exist, and [`Error::EmptySweep`] when the cross-product is empty.
    pub fn validate(&self) -> Result<()> {
        if self.binaries.is_empty() {
            return Err(Error::EmptySweep("no benchmark binaries".to_string()));
        }
        if self.bin_counts.is_empty() {
            return Err(Error::EmptySweep("no parameter values".to_string()));
        }
        if self.trials == 0 {
            return Err(Error::EmptySweep("trials per cell is zero".to_string()));
        }
        for binary in &self.binaries {
            if !binary.path.exists() {
                return Err(Error::MissingBinary {
                    path: binary.path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Total number of rows a complete sweep writes, failures included.
    #[must_use]
    pub fn expected_rows(&self) -> usize {
        self.binaries.len() * self.bin_counts.len() * 2 * self.trials as usize
    }
}

/// How to invoke the external profiler and the benchmark under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Profiler executable (a `perf`-compatible tool)
    pub program: PathBuf,
    /// Energy event requested from the profiler
    pub event: String,
    /// Wrap invocations in `sudo` (hardware energy counters need
    /// root-equivalent access)
    pub sudo: bool,
    /// Warm-up delay forwarded to the profiler's `--delay` flag in the
    /// windowed strategy; measurement auto-starts after it elapses
    pub warmup_delay: u64,
    /// Directory holding the control/acknowledgement FIFOs during a
    /// windowed invocation
    pub channel_dir: PathBuf,
    /// Input artifact passed to the benchmark as its first positional
    /// argument
    pub input_path: PathBuf,
    /// Output artifact passed to the benchmark as its last positional
    /// argument (written by the benchmark as an incidental side effect)
    pub output_path: PathBuf,
    /// Marker token identifying a benchmark's self-reported energy line in
    /// direct mode
    pub self_report_marker: String,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("perf"),
            event: "power/energy-pkg/".to_string(),
            sudo: true,
            warmup_delay: 1,
            channel_dir: PathBuf::from("."),
            input_path: PathBuf::from("image.png"),
            output_path: PathBuf::from("out.png"),
            self_report_marker: "[PowerCap]".to_string(),
        }
    }
}

impl ProfilerConfig {
    /// Path of the control FIFO for this configuration.
    #[must_use]
    pub fn ctl_path(&self) -> PathBuf {
        self.channel_dir.join(crate::profiler::control::CTL_NAME)
    }

    /// Path of the acknowledgement FIFO for this configuration.
    #[must_use]
    pub fn ack_path(&self) -> PathBuf {
        self.channel_dir.join(crate::profiler::control::ACK_NAME)
    }
}
