//! Performance benchmarks for registration, lookup and teardown

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use keystone_di::{Capabilities, Component, Container, Registration, StageResult};
use std::sync::Arc;

struct Plain;
impl Component for Plain {}

struct Staged;

impl Component for Staged {
    fn capabilities() -> Capabilities {
        Capabilities::INITIALIZABLE | Capabilities::STARTABLE | Capabilities::DISPOSABLE
    }

    fn start(&self) -> StageResult {
        black_box(());
        Ok(())
    }
}

fn benchmark_registration(c: &mut Criterion) {
    c.bench_function("register_singleton", |b| {
        b.iter(|| {
            let container = Container::with_defaults();
            black_box(container.register_singleton("plain", |_| Ok(Arc::new(Plain))))
        })
    });
}

fn benchmark_lookup(c: &mut Criterion) {
    let container = Container::with_defaults();
    container
        .register_singleton("plain", |_| Ok(Arc::new(Plain)))
        .unwrap();
    container
        .register_per_lookup("staged", |_| Ok(Arc::new(Staged)))
        .unwrap();
    container.lookup("plain").unwrap();

    c.bench_function("lookup_memoized_singleton", |b| {
        b.iter(|| black_box(container.lookup("plain").unwrap()))
    });

    c.bench_function("lookup_and_release_per_lookup", |b| {
        b.iter(|| {
            let handle = container.lookup("staged").unwrap();
            container.release(&handle).unwrap();
        })
    });
}

fn benchmark_chain_teardown(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_start_stop");
    for len in [4usize, 16, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(len), &len, |b, &len| {
            b.iter(|| {
                let container = Container::with_defaults();
                for index in 0..len {
                    let mut registration = Registration::singleton(format!("node-{}", index), |_| Ok(Arc::new(Staged)));
                    if index + 1 < len {
                        registration = registration.depends_on(format!("node-{}", index + 1));
                    }
                    container.register(registration.eager()).unwrap();
                }
                container.start().unwrap();
                black_box(container.stop().unwrap())
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_registration, benchmark_lookup, benchmark_chain_teardown);
criterion_main!(benches);
