//! Powerbench command-line interface.
//!
//! `measure` runs a sweep and writes the results table plus a JSON run
//! manifest; `plot` aggregates a finished table into the comparison chart;
//! `direct` runs one binary and prints its self-reported energy reading.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use powerbench::config::{BinarySpec, ProfilerConfig, SweepConfig};
use powerbench::profiler::{Measurement, PerfInvoker};
use powerbench::report;
use powerbench::sink::ResultsSink;
use powerbench::sweep::{run_sweep, SweepSummary};

#[derive(Parser)]
#[command(
    name = "powerbench",
    version,
    about = "Energy measurement sweep harness for perf-profiled benchmark binaries"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the measurement sweep and write the results table
    Measure(MeasureArgs),
    /// Aggregate a results table and render the comparison chart
    Plot(PlotArgs),
    /// Run one benchmark directly and print its self-reported energy
    Direct(DirectArgs),
}

#[derive(Args)]
struct MeasureArgs {
    /// Benchmark binary as `path=Label`; repeat for each variant
    #[arg(long = "binary", value_parser = parse_binary_spec, required = true)]
    binaries: Vec<BinarySpec>,

    /// Parameter values swept per binary
    #[arg(long, value_delimiter = ',', default_values_t = vec![2u32, 4, 8, 16, 32, 64])]
    bin_counts: Vec<u32>,

    /// Trials per (binary, parameter, strategy) cell
    #[arg(long, default_value_t = 5)]
    trials: u32,

    /// Results table path
    #[arg(long, default_value = "power_measurements.csv")]
    output: PathBuf,

    /// Energy event requested from the profiler
    #[arg(long, default_value = "power/energy-pkg/")]
    event: String,

    /// Input artifact passed to each benchmark
    #[arg(long, default_value = "image.png")]
    input_image: PathBuf,

    /// Output artifact each benchmark writes
    #[arg(long, default_value = "out.png")]
    output_image: PathBuf,

    /// Profiler executable
    #[arg(long, default_value = "perf")]
    profiler: PathBuf,

    /// Invoke the profiler without sudo
    #[arg(long)]
    no_sudo: bool,

    /// Cooldown pause between trials, in seconds
    #[arg(long, default_value_t = 1)]
    cooldown_secs: u64,

    /// Warm-up delay forwarded to the profiler in the windowed strategy
    #[arg(long, default_value_t = 1)]
    delay: u64,

    /// Directory for the control/acknowledgement FIFOs
    #[arg(long, default_value = ".")]
    channel_dir: PathBuf,
}

#[derive(Args)]
struct PlotArgs {
    /// Results table to aggregate
    #[arg(long, default_value = "power_measurements.csv")]
    input: PathBuf,

    /// Chart artifact path
    #[arg(long, default_value = "energy_comparison.png")]
    output: PathBuf,
}

#[derive(Args)]
struct DirectArgs {
    /// Benchmark binary to run
    #[arg(long)]
    binary: PathBuf,

    /// Parameter value passed to the benchmark
    #[arg(long, default_value_t = 2)]
    param: u32,

    /// Input artifact passed to the benchmark
    #[arg(long, default_value = "image.png")]
    input_image: PathBuf,

    /// Output artifact the benchmark writes
    #[arg(long, default_value = "out.png")]
    output_image: PathBuf,

    /// Marker token of the self-reported energy line
    #[arg(long, default_value = "[PowerCap]")]
    marker: String,

    /// Run the benchmark without sudo
    #[arg(long)]
    no_sudo: bool,
}

/// Reproducibility metadata written next to the results table.
#[derive(Serialize)]
struct RunManifest<'a> {
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    sweep: &'a SweepConfig,
    profiler: &'a ProfilerConfig,
    summary: SweepSummary,
}

fn parse_binary_spec(s: &str) -> Result<BinarySpec, String> {
    let (path, label) = s
        .split_once('=')
        .ok_or_else(|| format!("expected `path=Label`, got `{s}`"))?;
    if path.is_empty() || label.is_empty() {
        return Err(format!("expected `path=Label`, got `{s}`"));
    }
    Ok(BinarySpec::new(path, label))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Commands::Measure(args) => measure(args),
        Commands::Plot(args) => plot(&args),
        Commands::Direct(args) => direct(&args),
    }
}

fn measure(args: MeasureArgs) -> anyhow::Result<()> {
    let sweep = SweepConfig {
        binaries: args.binaries,
        bin_counts: args.bin_counts,
        trials: args.trials,
        cooldown: Duration::from_secs(args.cooldown_secs),
    };
    let profiler = ProfilerConfig {
        program: args.profiler,
        event: args.event,
        sudo: !args.no_sudo,
        warmup_delay: args.delay,
        channel_dir: args.channel_dir,
        input_path: args.input_image,
        output_path: args.output_image,
        ..ProfilerConfig::default()
    };

    // Fatal configuration faults surface before the table is touched.
    sweep.validate()?;

    let started_at = Utc::now();
    let invoker = PerfInvoker::new(profiler.clone());
    let mut sink = ResultsSink::create(&args.output)
        .with_context(|| format!("cannot create results table {}", args.output.display()))?;
    let summary = run_sweep(&sweep, &invoker, &mut sink)?;
    let finished_at = Utc::now();

    let manifest = RunManifest {
        started_at,
        finished_at,
        sweep: &sweep,
        profiler: &profiler,
        summary,
    };
    let manifest_path = PathBuf::from(format!("{}.meta.json", args.output.display()));
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)
        .with_context(|| format!("cannot write run manifest {}", manifest_path.display()))?;

    tracing::info!(
        rows = summary.rows_written,
        misses = summary.misses,
        table = %args.output.display(),
        "sweep complete"
    );
    Ok(())
}

fn plot(args: &PlotArgs) -> anyhow::Result<()> {
    report::aggregate_and_plot(&args.input, &args.output)
        .with_context(|| format!("cannot plot {}", args.input.display()))?;
    tracing::info!(chart = %args.output.display(), "chart written");
    Ok(())
}

fn direct(args: &DirectArgs) -> anyhow::Result<()> {
    let config = ProfilerConfig {
        sudo: !args.no_sudo,
        input_path: args.input_image.clone(),
        output_path: args.output_image.clone(),
        self_report_marker: args.marker.clone(),
        ..ProfilerConfig::default()
    };
    let invoker = PerfInvoker::new(config);
    match invoker.measure_self_reported(&args.binary, args.param) {
        Measurement::Joules(joules) => {
            println!("{joules:.6}");
            Ok(())
        }
        Measurement::Miss(reason) => anyhow::bail!("no reading: {reason}"),
    }
}
