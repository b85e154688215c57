//! Error types for Powerbench
//!
//! Only faults that invalidate the whole sweep surface as `Error`; anything
//! local to a single trial degrades to a `NaN` row via
//! [`crate::profiler::Measurement`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Powerbench error types
#[derive(Error, Debug)]
pub enum Error {
    /// A configured benchmark binary does not exist on disk. Surfaced before
    /// any trial runs: a sweep over a missing executable is meaningless.
    #[error("benchmark binary not found: {}", path.display())]
    MissingBinary {
        /// Path that failed the existence check
        path: PathBuf,
    },

    /// The sweep configuration describes an empty cross-product.
    #[error("sweep configuration is empty: {0}")]
    EmptySweep(String),

    /// Control-channel setup failed (FIFO creation, open, or descriptor
    /// flag change). Caught per-trial by the invoker and degraded to a
    /// `NaN` row; it only aborts a run when raised outside a sweep.
    #[error("control channel setup failed: {0}")]
    Channel(String),

    /// The profiler (or benchmark, in direct mode) could not be spawned.
    #[error("failed to spawn profiled command: {0}")]
    Spawn(String),

    /// Results table write error. Fatal: a sweep that cannot record trials
    /// has nothing to show for the energy it burns.
    #[error("results table error: {0}")]
    Csv(#[from] csv::Error),

    /// Chart rendering error
    #[error("chart rendering failed: {0}")]
    Chart(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
