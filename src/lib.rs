//! # Powerbench: Energy Measurement Sweep Harness
//!
//! Powerbench drives repeated executions of benchmark binaries under an
//! external energy profiler (`perf stat` with a RAPL-style event) and records
//! one CSV row per trial. Two measurement strategies are supported:
//!
//! - **`GlobalPerf`**: the profiler samples energy over the entire lifetime
//!   of the benchmark process.
//! - **`LocalPerf`**: the profiler's own start/stop control protocol (two
//!   named FIFOs plus a warm-up delay) excludes benchmark startup from the
//!   measurement window.
//!
//! A failed measurement is recorded as a `NaN` sentinel row, never omitted,
//! so a complete sweep always has `binaries x parameters x 2 x trials` rows.
//! The finished table feeds a pure aggregation step that renders a
//! mean-with-error-bars comparison chart.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use powerbench::config::{BinarySpec, ProfilerConfig, SweepConfig};
//! use powerbench::profiler::PerfInvoker;
//! use powerbench::sink::ResultsSink;
//! use powerbench::sweep::run_sweep;
//!
//! let sweep = SweepConfig {
//!     binaries: vec![
//!         BinarySpec::new("./seg_original", "Original"),
//!         BinarySpec::new("./seg_simd", "SIMD"),
//!     ],
//!     ..SweepConfig::default()
//! };
//! let invoker = PerfInvoker::new(ProfilerConfig::default());
//! let mut sink = ResultsSink::create("power_measurements.csv")?;
//! let summary = run_sweep(&sweep, &invoker, &mut sink)?;
//! println!("{} rows, {} misses", summary.rows_written, summary.misses);
//! # Ok::<(), powerbench::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod profiler;
pub mod report;
pub mod sink;
pub mod sweep;

pub use error::{Error, Result};
