use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use reflex_core::stats;

// Spread of plausible human latencies with a few outliers past the chart.
fn latencies(n: usize) -> Vec<u64> {
    (0..n as u64).map(|i| 150 + (i * 37) % 420).collect()
}

pub fn bench_histogram(c: &mut Criterion) {
    let mut g = c.benchmark_group("histogram");

    let empty: &[u64] = &[];
    g.bench_function("placeholder", |b| b.iter(|| stats::histogram(black_box(empty))));

    for n in [10usize, 100, 1_000] {
        let data = latencies(n);
        g.bench_with_input(BenchmarkId::new("recorded", n), &data, |b, data| {
            b.iter(|| stats::histogram(black_box(data)))
        });
        g.bench_with_input(BenchmarkId::new("summary", n), &data, |b, data| {
            b.iter(|| stats::SessionSummary::from_latencies(black_box(data), 5))
        });
    }

    g.finish();
}

criterion_group!(benches, bench_histogram);
criterion_main!(benches);
