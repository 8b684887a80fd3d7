use criterion::{Criterion, criterion_group, criterion_main};
use rand_core::RngCore;
use rand_xoshiro::Xoshiro256StarStar;
use rand_xoshiro::rand_core::SeedableRng;
use std::hint::black_box;
use wfpad::{Histogram, Label};

/// A burst histogram shaped like the ones Adaptive Padding ships: many
/// short delays, a long tail and an infinity bin.
fn burst_histogram(interpolate: bool, remove_tokens: bool) -> Histogram {
    let mut labels: Vec<Label> = (0..20).map(|i| Label::Finite(1 << i)).collect();
    let mut counts: Vec<u64> = (0..20).map(|i| 1000 >> (i / 2)).collect();
    labels.push(Label::Infinity);
    counts.push(50);
    Histogram::new(labels, counts, interpolate, remove_tokens).unwrap()
}

fn sample_n<R: RngCore>(rng: &mut R, h: &mut Histogram, n: usize) -> f64 {
    let mut sum = 0.0;
    for _ in 0..n {
        let v = h.sample(rng);
        if v.is_finite() {
            sum += v;
        }
    }
    sum
}

pub fn histogram_benchmarks(c: &mut Criterion) {
    let n = 100;

    c.bench_function("Histogram 100 samples, rng()", |b| {
        let rng = &mut rand::rng();
        let mut h = burst_histogram(false, false);
        b.iter(|| sample_n(rng, &mut h, black_box(n)))
    });

    c.bench_function("Histogram 100 samples, Xoshiro256StarStar", |b| {
        let rng = &mut Xoshiro256StarStar::seed_from_u64(0);
        let mut h = burst_histogram(false, false);
        b.iter(|| sample_n(rng, &mut h, black_box(n)))
    });

    c.bench_function("Histogram 100 samples, interpolated", |b| {
        let rng = &mut Xoshiro256StarStar::seed_from_u64(0);
        let mut h = burst_histogram(true, false);
        b.iter(|| sample_n(rng, &mut h, black_box(n)))
    });

    c.bench_function("Histogram 100 samples, token removal", |b| {
        let rng = &mut Xoshiro256StarStar::seed_from_u64(0);
        let mut h = burst_histogram(true, true);
        b.iter(|| sample_n(rng, &mut h, black_box(n)))
    });

    c.bench_function("Histogram remove_token 100 values", |b| {
        let rng = &mut Xoshiro256StarStar::seed_from_u64(0);
        let mut h = burst_histogram(false, true);
        b.iter(|| {
            for _ in 0..n {
                let v = (rng.next_u32() % 600_000) as f64 / 1000.0;
                h.remove_token(black_box(v));
            }
        })
    });
}

criterion_group!(benches, histogram_benchmarks);
criterion_main!(benches);
