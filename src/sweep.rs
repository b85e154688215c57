//! Sweep Driver
//!
//! Iterates the full measurement cross-product in a fixed, deterministic
//! order and appends one row per trial to the results sink. Downstream
//! aggregation assumes configuration grouping is stable, so the order is
//! part of the contract: binaries, then parameters, then strategy
//! (`GlobalPerf` before `LocalPerf`), then trial index.

use std::thread;

use serde::Serialize;

use crate::config::SweepConfig;
use crate::error::Result;
use crate::profiler::{MeasurementType, PerfInvoker};
use crate::sink::{ResultsSink, TrialRecord};

/// Counters describing a finished sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Rows appended to the results table
    pub rows_written: usize,
    /// Rows recorded with the `NaN` sentinel
    pub misses: usize,
}

/// Run the full sweep described by `config`, appending one row per trial.
///
/// Per-trial failures (parse misses, spawn errors, control-channel setup)
/// degrade to `NaN` rows and the sweep continues; each trial is attempted
/// exactly once. The row count of a completed sweep is therefore always
/// [`SweepConfig::expected_rows`]. After every trial a cooldown pause
/// elapses so hardware power state settles before the next measurement.
///
/// # Errors
///
/// Returns an error before any trial runs when the configuration is invalid
/// (missing binary, empty cross-product), or mid-sweep when the sink can no
/// longer record rows.
pub fn run_sweep(
    config: &SweepConfig,
    invoker: &PerfInvoker,
    sink: &mut ResultsSink,
) -> Result<SweepSummary> {
    config.validate()?;

    let mut summary = SweepSummary::default();
    for binary in &config.binaries {
        for &bin_count in &config.bin_counts {
            tracing::info!(version = %binary.label, bin_count, "measuring cell");
            for strategy in MeasurementType::ALL {
                for trial in 1..=config.trials {
                    let measurement = invoker.measure(strategy, &binary.path, bin_count);
                    if let crate::profiler::Measurement::Miss(reason) = &measurement {
                        tracing::warn!(version = %binary.label, bin_count, %strategy, trial,
                            %reason, "trial recorded as NaN");
                        summary.misses += 1;
                    } else {
                        tracing::debug!(version = %binary.label, bin_count, %strategy, trial,
                            joules = measurement.joules(), "trial complete");
                    }

                    sink.append(&TrialRecord::new(
                        &binary.label,
                        bin_count,
                        strategy,
                        trial,
                        measurement.joules(),
                    ))?;
                    summary.rows_written += 1;

                    thread::sleep(config.cooldown);
                }
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BinarySpec, ProfilerConfig};
    use crate::error::Error;

    #[test]
    fn test_run_sweep_rejects_invalid_config_before_writing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut sink =
            ResultsSink::create(dir.path().join("table.csv")).expect("create sink");
        let invoker = PerfInvoker::new(ProfilerConfig::default());

        let config = SweepConfig {
            binaries: vec![BinarySpec::new("/nonexistent/bin", "Broken")],
            ..SweepConfig::default()
        };
        let result = run_sweep(&config, &invoker, &mut sink);
        assert!(matches!(result, Err(Error::MissingBinary { .. })));

        // Header only; no trial rows were attempted.
        let contents =
            std::fs::read_to_string(dir.path().join("table.csv")).expect("read table");
        assert_eq!(contents.lines().count(), 1);
    }
}
