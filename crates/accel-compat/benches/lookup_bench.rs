//! Criterion benchmarks for the registry hot path.
//! After the first resolution every call should be a cheap read.
//! Results: by default under target/criterion; to store under data/bench, run:
//!   CARGO_TARGET_DIR=data/bench cargo bench -p accel-compat

use std::sync::Arc;

use accel_compat::{CapabilityProvider, InProcessLoader, InProcessProvider, Registry};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn registry(n: usize) -> Registry {
    let mut loader = InProcessLoader::new();
    for i in 0..n {
        let p: Arc<dyn CapabilityProvider> = Arc::new(
            InProcessProvider::new(format!("cap{i}"))
                .with_operation("id", |x| Ok(x.to_vec()))
                .unwrap(),
        );
        loader = loader.with_provider(p);
    }
    let reg = Registry::new(loader);
    for i in 0..n {
        reg.resolve(&format!("cap{i}")).unwrap();
        reg.resolve(&format!("missing{i}")).unwrap();
    }
    reg
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("registry");
    for &n in &[1usize, 16, 256] {
        let reg = registry(n);
        group.bench_with_input(BenchmarkId::new("resolve_bound", n), &n, |b, _| {
            b.iter(|| reg.resolve("cap0").unwrap())
        });
        group.bench_with_input(BenchmarkId::new("lookup", n), &n, |b, _| {
            b.iter(|| reg.lookup("missing0").unwrap())
        });
        group.bench_with_input(BenchmarkId::new("stand_in_call", n), &n, |b, _| {
            let p = reg.lookup("missing0").unwrap();
            b.iter(|| p.call("remesh", &[1.0, 2.0]).unwrap_err())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lookup);
criterion_main!(benches);
