//! Per-device extraction benchmarks
//!
//! Synthetic sweeps with four drain levels and a linear turn-on. The large
//! case repeats every measurement so slice averaging has work to do.
//!
//! Run with: cargo bench --bench extraction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nmos_probe::config::ExtractionConfig;
use nmos_probe::extract::{extract_device, extract_vth, gradient, DeviceId};
use nmos_probe::sweep::{slice_at, Sample, SweepTable};

const SMALL_GATE_POINTS: usize = 11; // 0..=10 V in 1 V steps
const LARGE_GATE_POINTS: usize = 1_001; // 10 mV steps

fn sweep(gate_points: usize, repeats: usize) -> SweepTable {
    let step = 10.0 / (gate_points - 1) as f64;
    let mut samples = Vec::with_capacity(4 * gate_points * repeats);
    for vd in [0.2, 1.0, 5.0, 10.0] {
        for i in 0..gate_points {
            let vg = i as f64 * step;
            let id = if vg >= 2.0 { 1e-4 * (vg - 2.0) } else { 0.0 };
            for r in 0..repeats {
                samples.push(Sample::new(vd, vg, id * (1.0 + 1e-3 * r as f64), 1e-12));
            }
        }
    }
    SweepTable::from_samples(samples)
}

/// Benchmark the full per-device orchestration
fn bench_extract_device(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_device");
    let config = ExtractionConfig::default();

    for (gate_points, repeats) in [(SMALL_GATE_POINTS, 1), (LARGE_GATE_POINTS, 1), (LARGE_GATE_POINTS, 4)] {
        let table = sweep(gate_points, repeats);
        group.bench_with_input(
            BenchmarkId::new(format!("gate_points_{gate_points}"), table.len()),
            &table,
            |b, table| {
                b.iter(|| {
                    extract_device(
                        DeviceId::new(5, 1, 1, "nmos5 pattern1 chip1.xls"),
                        black_box(table),
                        &config,
                    )
                });
            },
        );
    }

    group.finish();
}

/// Benchmark slicing and threshold extraction separately
fn bench_slice_and_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("slice_threshold");
    let table = sweep(LARGE_GATE_POINTS, 4);

    group.bench_function("slice_at_5V", |b| {
        b.iter(|| slice_at(black_box(&table), 5.0, 0.02));
    });

    let slice = slice_at(&table, 5.0, 0.02).unwrap();
    group.bench_function("extract_vth", |b| {
        b.iter(|| extract_vth(black_box(&slice)));
    });

    let x = slice.gate_v();
    let y = slice.drain_i();
    group.bench_function("gradient", |b| {
        b.iter(|| gradient(black_box(&y), black_box(&x)));
    });

    group.finish();
}

criterion_group!(benches, bench_extract_device, bench_slice_and_threshold);
criterion_main!(benches);
