//! Profiler Invoker
//!
//! Runs single profiled executions of benchmark binaries and parses the
//! profiler's diagnostic report into energy readings.
//!
//! ## Strategies
//!
//! ```text
//! GlobalPerf   profiler wraps the whole process lifetime
//! LocalPerf    profiler starts sampling after a warm-up delay, driven by
//!              its own control protocol over a FIFO pair
//! ```
//!
//! Both parse the same report format and share the same policy: a trial
//! that cannot produce a reading yields [`Measurement::Miss`], never an
//! error that could abort a sweep.

pub mod control;
mod invoker;

pub use control::ControlChannel;
pub use invoker::{Measurement, MeasurementType, MissReason, PerfInvoker};
