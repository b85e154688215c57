//! End-to-end sweep tests against fake profiler scripts
//!
//! A stand-in `perf` emitting canned diagnostic reports exercises the full
//! driver → invoker → sink path without hardware counters or root.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use powerbench::config::{BinarySpec, ProfilerConfig, SweepConfig};
use powerbench::profiler::{Measurement, MeasurementType, PerfInvoker};
use powerbench::sink::{load_table, ResultsSink, TrialRecord};
use powerbench::sweep::run_sweep;

fn write_executable(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("write script");
    let mut perms = fs::metadata(&path).expect("stat script").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// A profiler that always reports 7.25 Joules for the package event.
fn steady_profiler(dir: &Path) -> PathBuf {
    write_executable(
        dir,
        "fake_perf",
        "#!/bin/sh\necho '   7.250000      Joules power/energy-pkg/' >&2\n",
    )
}

/// A profiler that produces no energy line at all.
fn broken_profiler(dir: &Path) -> PathBuf {
    write_executable(
        dir,
        "broken_perf",
        "#!/bin/sh\necho 'event syntax error: unsupported event' >&2\nexit 1\n",
    )
}

/// A profiler whose first invocation misses and every later one succeeds.
fn flaky_profiler(dir: &Path) -> PathBuf {
    let flag = dir.join("first_call.flag");
    let body = format!(
        "#!/bin/sh\n\
         if [ ! -e \"{flag}\" ]; then\n\
         \x20 : > \"{flag}\"\n\
         \x20 echo 'event syntax error: unsupported event' >&2\n\
         else\n\
         \x20 echo '   7.250000      Joules power/energy-pkg/' >&2\n\
         fi\n",
        flag = flag.display()
    );
    write_executable(dir, "flaky_perf", &body)
}

fn dummy_benchmark(dir: &Path, name: &str) -> PathBuf {
    write_executable(dir, name, "#!/bin/sh\nexit 0\n")
}

fn two_by_two_sweep(dir: &Path) -> SweepConfig {
    SweepConfig {
        binaries: vec![
            BinarySpec::new(dummy_benchmark(dir, "seg_a"), "A"),
            BinarySpec::new(dummy_benchmark(dir, "seg_b"), "B"),
        ],
        bin_counts: vec![2, 4],
        trials: 2,
        cooldown: Duration::ZERO,
    }
}

fn profiler_config(dir: &Path, program: PathBuf) -> ProfilerConfig {
    ProfilerConfig {
        program,
        sudo: false,
        channel_dir: dir.to_path_buf(),
        input_path: dir.join("in.dat"),
        output_path: dir.join("out.dat"),
        ..ProfilerConfig::default()
    }
}

#[test]
fn test_complete_sweep_has_full_row_count() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let sweep = two_by_two_sweep(tmp.path());
    let invoker = PerfInvoker::new(profiler_config(tmp.path(), steady_profiler(tmp.path())));
    let table = tmp.path().join("table.csv");
    let mut sink = ResultsSink::create(&table).expect("create sink");

    let summary = run_sweep(&sweep, &invoker, &mut sink).expect("sweep");
    assert_eq!(summary.rows_written, sweep.expected_rows());
    assert_eq!(summary.rows_written, 16);
    assert_eq!(summary.misses, 0);

    let records = load_table(&table).expect("load table");
    assert_eq!(records.len(), 16);
    for record in &records {
        assert!((record.energy_joules() - 7.25).abs() < 1e-12);
    }
}

#[test]
fn test_sweep_iteration_order_is_deterministic() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let sweep = two_by_two_sweep(tmp.path());
    let invoker = PerfInvoker::new(profiler_config(tmp.path(), steady_profiler(tmp.path())));
    let table = tmp.path().join("table.csv");
    let mut sink = ResultsSink::create(&table).expect("create sink");
    run_sweep(&sweep, &invoker, &mut sink).expect("sweep");

    let mut expected = Vec::new();
    for version in ["A", "B"] {
        for bin_count in [2u32, 4] {
            for strategy in MeasurementType::ALL {
                for trial in 1..=2u32 {
                    expected.push((version.to_string(), bin_count, strategy, trial));
                }
            }
        }
    }
    let actual: Vec<_> = load_table(&table)
        .expect("load table")
        .iter()
        .map(|r| {
            (
                r.version().to_string(),
                r.bin_count(),
                r.measurement_type(),
                r.trial(),
            )
        })
        .collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_forced_first_miss_yields_exactly_one_nan_row() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let sweep = two_by_two_sweep(tmp.path());
    let invoker = PerfInvoker::new(profiler_config(tmp.path(), flaky_profiler(tmp.path())));
    let table = tmp.path().join("table.csv");
    let mut sink = ResultsSink::create(&table).expect("create sink");

    let summary = run_sweep(&sweep, &invoker, &mut sink).expect("sweep");
    assert_eq!(summary.rows_written, 16);
    assert_eq!(summary.misses, 1);

    let records = load_table(&table).expect("load table");
    let (nan_rows, numeric_rows): (Vec<&TrialRecord>, Vec<&TrialRecord>) = records
        .iter()
        .partition(|r| r.energy_joules().is_nan());
    assert_eq!(nan_rows.len(), 1);
    assert_eq!(numeric_rows.len(), 15);
    // The miss landed on the very first trial.
    assert!(records[0].energy_joules().is_nan());
    for record in numeric_rows {
        assert!((record.energy_joules() - 7.25).abs() < 1e-12);
    }
}

#[test]
fn test_profiler_failure_never_aborts_the_sweep() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let sweep = two_by_two_sweep(tmp.path());
    let invoker = PerfInvoker::new(profiler_config(tmp.path(), broken_profiler(tmp.path())));
    let table = tmp.path().join("table.csv");
    let mut sink = ResultsSink::create(&table).expect("create sink");

    let summary = run_sweep(&sweep, &invoker, &mut sink).expect("sweep");
    assert_eq!(summary.rows_written, 16);
    assert_eq!(summary.misses, 16);
    let records = load_table(&table).expect("load table");
    assert!(records.iter().all(|r| r.energy_joules().is_nan()));
}

#[test]
fn test_control_channels_removed_after_sweep() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let sweep = two_by_two_sweep(tmp.path());
    let profiler = profiler_config(tmp.path(), steady_profiler(tmp.path()));
    let ctl = profiler.ctl_path();
    let ack = profiler.ack_path();
    let invoker = PerfInvoker::new(profiler);
    let mut sink = ResultsSink::create(tmp.path().join("table.csv")).expect("create sink");

    run_sweep(&sweep, &invoker, &mut sink).expect("sweep");
    assert!(!ctl.exists());
    assert!(!ack.exists());
}

#[test]
fn test_windowed_invocation_recovers_from_stale_channels() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let profiler = profiler_config(tmp.path(), steady_profiler(tmp.path()));
    let ctl = profiler.ctl_path();
    let ack = profiler.ack_path();
    // A previous invocation crashed and left its channels behind.
    fs::write(&ctl, b"stale").expect("write stale ctl");
    fs::write(&ack, b"stale").expect("write stale ack");

    let binary = dummy_benchmark(tmp.path(), "seg_a");
    let invoker = PerfInvoker::new(profiler);
    let measurement = invoker.measure(MeasurementType::LocalPerf, &binary, 2);

    assert_eq!(measurement, Measurement::Joules(7.25));
    assert!(!ctl.exists());
    assert!(!ack.exists());
}

#[test]
fn test_windowed_invocation_exports_control_descriptors() {
    let tmp = tempfile::tempdir().expect("tempdir");
    // Echo the advertised control descriptors back through the report line;
    // both must be present and numeric for the line to form.
    let recorder = write_executable(
        tmp.path(),
        "env_perf",
        "#!/bin/sh\n\
         if [ -n \"$PERF_CTL_FD\" ] && [ -n \"$PERF_ACK_FD\" ]; then\n\
         \x20 echo \"   $PERF_CTL_FD.$PERF_ACK_FD      Joules power/energy-pkg/\" >&2\n\
         fi\n",
    );
    let binary = dummy_benchmark(tmp.path(), "seg_a");
    let invoker = PerfInvoker::new(profiler_config(tmp.path(), recorder));

    let measurement = invoker.measure(MeasurementType::LocalPerf, &binary, 2);
    match measurement {
        Measurement::Joules(encoded) => assert!(encoded > 2.0, "descriptors should be > 2"),
        Measurement::Miss(reason) => panic!("control env not exported: {reason}"),
    }
}

#[test]
fn test_direct_mode_parses_self_report() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let benchmark = write_executable(
        tmp.path(),
        "self_reporting",
        "#!/bin/sh\necho 'processing image'\necho '[PowerCap] package energy: 3.50 J'\n",
    );
    let invoker = PerfInvoker::new(profiler_config(tmp.path(), PathBuf::from("unused")));

    let measurement = invoker.measure_self_reported(&benchmark, 4);
    assert_eq!(measurement, Measurement::Joules(3.5));
}
