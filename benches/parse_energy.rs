//! Profiler report parsing benchmark
//!
//! The parser runs once per trial, between subprocess waits, so this is a
//! sanity baseline rather than a hot path.
//!
//! Run with: cargo bench --bench parse_energy

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use powerbench::config::ProfilerConfig;
use powerbench::profiler::PerfInvoker;

const REPORT: &str = "\n Performance counter stats for './seg_simd image.png 32 out.png':\n\n\
    \x20        12.345000      Joules power/energy-pkg/\n\n\
    \x20      1.002341235 seconds time elapsed\n\n\
    \x20      0.901223000 seconds user\n\
    \x20      0.100021000 seconds sys\n";

const REPORT_NO_ENERGY: &str = "\nevent syntax error: 'power/energy-pkg/'\n\
    \x20                 \\___ unknown event\n";

fn bench_parse_energy(c: &mut Criterion) {
    let invoker = PerfInvoker::new(ProfilerConfig::default());

    c.bench_function("parse_energy_hit", |b| {
        b.iter(|| invoker.parse_energy(black_box(REPORT)));
    });

    c.bench_function("parse_energy_miss", |b| {
        b.iter(|| invoker.parse_energy(black_box(REPORT_NO_ENERGY)));
    });
}

criterion_group!(benches, bench_parse_energy);
criterion_main!(benches);
