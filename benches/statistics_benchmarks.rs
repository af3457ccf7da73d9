//! Benchmarks for the statistics reducer and the bitrate windowing engine.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::Criterion;
use vqscore::{PacketRecord, compute_bitrate_windows, parse_psnr_stats, summarize};

fn synthetic_series(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 80.0 + ((i * 7919) % 2003) as f64 / 100.0)
        .collect()
}

fn synthetic_packets(seconds: usize, fps: usize) -> Vec<PacketRecord> {
    (0..seconds * fps)
        .map(|i| {
            let size = if i % fps == 0 { 60_000 } else { 4_000 + (i % 13) as u64 * 100 };
            PacketRecord::new(i as f64 / fps as f64, size)
        })
        .collect()
}

fn benchmark_summarize(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("summarize");
    for len in [1_000, 100_000] {
        let series = synthetic_series(len);
        group.bench_function(format!("{len} frames"), |bencher| {
            bencher.iter(|| summarize("vmaf", black_box(&series)).unwrap());
        });
    }
    group.finish();
}

fn benchmark_bitrate_windows(criterion: &mut Criterion) {
    // Two hours at 60 fps.
    let packets = synthetic_packets(7_200, 60);
    criterion.bench_function("bitrate windows (2h @ 60fps)", |bencher| {
        bencher.iter(|| compute_bitrate_windows(black_box(&packets)));
    });
}

fn benchmark_psnr_parsing(criterion: &mut Criterion) {
    let log: String = (1..=10_000)
        .map(|n| {
            format!(
                "n:{n} mse_avg:3.52 mse_y:4.41 mse_u:1.88 mse_v:1.61 psnr_avg:42.67 psnr_y:41.69 psnr_u:45.39 psnr_v:46.07\n"
            )
        })
        .collect();
    criterion.bench_function("parse psnr stats (10k lines)", |bencher| {
        bencher.iter(|| parse_psnr_stats(black_box(&log)));
    });
}

criterion::criterion_group!(
    benches,
    benchmark_summarize,
    benchmark_bitrate_windows,
    benchmark_psnr_parsing,
);
criterion::criterion_main!(benches);
