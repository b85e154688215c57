//! Profiler invocation and report parsing
//!
//! One invocation = one profiled execution of a benchmark binary = one
//! [`Measurement`]. Failures never escape a trial: the invoker returns an
//! explicit [`Measurement::Miss`] carrying the reason, and the sweep driver
//! records the `NaN` sentinel.

use std::path::Path;
use std::process::{Command, Output};

use regex::Regex;

use crate::config::ProfilerConfig;
use crate::error::{Error, Result};

use super::control::ControlChannel;

/// Regex extracting the Joules value from a profiler report line.
const ENERGY_PATTERN: &str = r"(\d+\.\d+)\s+Joules";

/// The two strategies a sweep measures under, in sweep order.
///
/// Variant names double as the `MeasurementType` column values in the
/// results table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub enum MeasurementType {
    /// Energy sampled over the entire lifetime of the profiled process
    GlobalPerf,
    /// Energy sampled in a window controlled by the profiler's own
    /// start/stop protocol, excluding a warm-up delay
    LocalPerf,
}

impl MeasurementType {
    /// Both strategies, in the order the sweep runs them.
    pub const ALL: [Self; 2] = [Self::GlobalPerf, Self::LocalPerf];
}

impl std::fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GlobalPerf => write!(f, "GlobalPerf"),
            Self::LocalPerf => write!(f, "LocalPerf"),
        }
    }
}

/// Why an invocation produced no energy reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissReason {
    /// The profiler report contained no parseable energy line (profiler
    /// failure, permission error, unsupported event).
    #[error("no parseable energy line in profiler report")]
    NoEnergyLine,
    /// The benchmark printed no recognizable self-report line.
    #[error("no self-reported energy line in benchmark output")]
    NoSelfReport,
    /// The profiler or benchmark process could not be spawned.
    #[error("spawn failed: {0}")]
    Spawn(String),
    /// Control-channel setup failed before the profiler started.
    #[error("control channel setup failed: {0}")]
    Channel(String),
}

/// Outcome of one profiled invocation.
///
/// The sweep driver's sentinel policy is an explicit branch on this type,
/// not an implicit catch-all around the subprocess machinery.
#[derive(Debug, Clone, PartialEq)]
pub enum Measurement {
    /// A valid energy reading
    Joules(f64),
    /// A recorded failure; persisted as the `NaN` sentinel
    Miss(MissReason),
}

impl Measurement {
    /// The reading as a float, with misses collapsed to the `NaN` sentinel.
    #[must_use]
    pub fn joules(&self) -> f64 {
        match self {
            Self::Joules(j) => *j,
            Self::Miss(_) => f64::NAN,
        }
    }

    /// Whether this outcome is a recorded failure.
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::Miss(_))
    }
}

/// Builds and runs single profiled executions of benchmark binaries.
#[derive(Debug)]
pub struct PerfInvoker {
    config: ProfilerConfig,
    energy_re: Regex,
}

impl PerfInvoker {
    /// Create an invoker for the given profiler configuration.
    #[must_use]
    pub fn new(config: ProfilerConfig) -> Self {
        let energy_re =
            Regex::new(ENERGY_PATTERN).expect("`ENERGY_PATTERN` should be a valid regex");
        Self { config, energy_re }
    }

    /// The configuration this invoker runs with.
    #[must_use]
    pub const fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Run one profiled execution of `binary` with `parameter` under the
    /// given strategy.
    ///
    /// Never fails out of a sweep: spawn and channel-setup errors degrade to
    /// [`Measurement::Miss`].
    pub fn measure(
        &self,
        strategy: MeasurementType,
        binary: &Path,
        parameter: u32,
    ) -> Measurement {
        let outcome = match strategy {
            MeasurementType::GlobalPerf => self.run_global(binary, parameter),
            MeasurementType::LocalPerf => self.run_windowed(binary, parameter),
        };
        outcome.unwrap_or_else(|e| {
            tracing::warn!(%strategy, binary = %binary.display(), parameter, error = %e,
                "invocation setup failed");
            Measurement::Miss(miss_reason(&e))
        })
    }

    /// Run `binary` directly and parse its self-reported energy line.
    ///
    /// An alternative data source for binaries that sample a power interface
    /// themselves and print `... <joules> J`; not part of the sweep
    /// cross-product.
    pub fn measure_self_reported(&self, binary: &Path, parameter: u32) -> Measurement {
        self.run_direct(binary, parameter).unwrap_or_else(|e| {
            tracing::warn!(binary = %binary.display(), parameter, error = %e,
                "direct invocation failed");
            Measurement::Miss(miss_reason(&e))
        })
    }

    /// Extract the energy reading for the configured event from a profiler
    /// diagnostic report.
    ///
    /// The reading is on a line containing both `Joules` and the event name,
    /// as `<float>      Joules  <event>`. Anything else is a miss.
    #[must_use]
    pub fn parse_energy(&self, report: &str) -> Measurement {
        let value = report
            .lines()
            .find(|line| line.contains("Joules") && line.contains(&self.config.event))
            .and_then(|line| self.energy_re.captures(line))
            .and_then(|caps| caps[1].parse::<f64>().ok());
        match value {
            Some(joules) => Measurement::Joules(joules),
            None => Measurement::Miss(MissReason::NoEnergyLine),
        }
    }

    /// Extract a benchmark's self-reported reading: the second-to-last
    /// whitespace field of the line carrying the marker token.
    #[must_use]
    pub fn parse_self_report(&self, stdout: &str) -> Measurement {
        let value = stdout
            .lines()
            .find(|line| line.contains(&self.config.self_report_marker))
            .and_then(|line| {
                let fields: Vec<&str> = line.split_whitespace().collect();
                fields.get(fields.len().checked_sub(2)?)?.parse::<f64>().ok()
            });
        match value {
            Some(joules) => Measurement::Joules(joules),
            None => Measurement::Miss(MissReason::NoSelfReport),
        }
    }

    fn run_global(&self, binary: &Path, parameter: u32) -> Result<Measurement> {
        let mut cmd = self.profiler_command(false);
        cmd.arg("stat")
            .arg("-e")
            .arg(&self.config.event)
            .arg(binary)
            .arg(&self.config.input_path)
            .arg(parameter.to_string())
            .arg(&self.config.output_path);
        let output = run_capturing(&mut cmd)?;
        Ok(self.parse_energy(&String::from_utf8_lossy(&output.stderr)))
    }

    fn run_windowed(&self, binary: &Path, parameter: u32) -> Result<Measurement> {
        let channel = ControlChannel::create(&self.config.channel_dir)?;

        let mut cmd = self.profiler_command(true);
        cmd.arg("stat")
            .arg("-e")
            .arg(&self.config.event)
            .arg("--control")
            .arg(format!("fd:{},{}", channel.ctl_fd(), channel.ack_fd()))
            .arg(format!("--delay={}", self.config.warmup_delay))
            .arg("--")
            .arg(binary)
            .arg(&self.config.input_path)
            .arg(parameter.to_string())
            .arg(&self.config.output_path)
            .env("PERF_CTL_FD", channel.ctl_fd().to_string())
            .env("PERF_ACK_FD", channel.ack_fd().to_string());

        let output = run_capturing(&mut cmd)?;
        Ok(self.parse_energy(&String::from_utf8_lossy(&output.stderr)))
        // `channel` drops here, removing both FIFOs even when parsing missed.
    }

    fn run_direct(&self, binary: &Path, parameter: u32) -> Result<Measurement> {
        let mut cmd = if self.config.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(binary);
            cmd
        } else {
            Command::new(binary)
        };
        cmd.arg(&self.config.input_path)
            .arg(parameter.to_string())
            .arg(&self.config.output_path);
        let output = run_capturing(&mut cmd)?;
        Ok(self.parse_self_report(&String::from_utf8_lossy(&output.stdout)))
    }

    fn profiler_command(&self, preserve_control_env: bool) -> Command {
        if self.config.sudo {
            let mut cmd = Command::new("sudo");
            if preserve_control_env {
                // sudo scrubs the environment; the control descriptors are
                // advertised to the profiler through these variables.
                cmd.arg("--preserve-env=PERF_CTL_FD,PERF_ACK_FD");
            }
            cmd.arg(&self.config.program);
            cmd
        } else {
            Command::new(&self.config.program)
        }
    }
}

fn run_capturing(cmd: &mut Command) -> Result<Output> {
    cmd.output()
        .map_err(|e| Error::Spawn(format!("{:?}: {e}", cmd.get_program())))
}

fn miss_reason(error: &Error) -> MissReason {
    match error {
        Error::Channel(msg) => MissReason::Channel(msg.clone()),
        Error::Spawn(msg) => MissReason::Spawn(msg.clone()),
        other => MissReason::Spawn(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfilerConfig;

    fn invoker() -> PerfInvoker {
        PerfInvoker::new(ProfilerConfig {
            sudo: false,
            ..ProfilerConfig::default()
        })
    }

    #[test]
    fn test_parse_energy_reads_joules_line() {
        let m = invoker().parse_energy("  12.345000      Joules power/energy-pkg/");
        assert_eq!(m, Measurement::Joules(12.345));
    }

    #[test]
    fn test_parse_energy_skips_other_report_lines() {
        let report = "\n Performance counter stats for './seg_simd':\n\n\
                      \x20     7.250000      Joules power/energy-pkg/\n\n\
                      \x20      1.0023 seconds time elapsed\n";
        assert_eq!(invoker().parse_energy(report), Measurement::Joules(7.25));
    }

    #[test]
    fn test_parse_energy_misses_without_joules_token() {
        let m = invoker().parse_energy("event syntax error: power/energy-pkg/ not supported");
        assert_eq!(m, Measurement::Miss(MissReason::NoEnergyLine));
        assert!(m.joules().is_nan());
    }

    #[test]
    fn test_parse_energy_requires_event_name() {
        let m = invoker().parse_energy("  3.000000      Joules some/other-event/");
        assert!(m.is_miss());
    }

    #[test]
    fn test_parse_self_report() {
        let m = invoker().parse_self_report("loading image\n[PowerCap] package energy: 3.14 J\n");
        assert_eq!(m, Measurement::Joules(3.14));
    }

    #[test]
    fn test_parse_self_report_misses_without_marker() {
        let m = invoker().parse_self_report("done in 1.2 s\n");
        assert_eq!(m, Measurement::Miss(MissReason::NoSelfReport));
    }

    #[test]
    fn test_measure_degrades_spawn_failure_to_miss() {
        let invoker = PerfInvoker::new(ProfilerConfig {
            program: "/nonexistent/profiler".into(),
            sudo: false,
            ..ProfilerConfig::default()
        });
        let m = invoker.measure(MeasurementType::GlobalPerf, Path::new("/bin/true"), 2);
        assert!(matches!(m, Measurement::Miss(MissReason::Spawn(_))));
        assert!(m.joules().is_nan());
    }

    #[test]
    fn test_measurement_type_order_and_display() {
        assert_eq!(MeasurementType::ALL[0].to_string(), "GlobalPerf");
        assert_eq!(MeasurementType::ALL[1].to_string(), "LocalPerf");
        assert!(MeasurementType::GlobalPerf < MeasurementType::LocalPerf);
    }
}
