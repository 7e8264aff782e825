//! Specialization latency and the speed of what it produces.
//!
//! Measures:
//! 1. A full pass (extract, rewrite, reassemble, compile) with the cache off
//! 2. A cached gateway call
//! 3. Interpreted vs compiled execution of a windowed pass

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use fastats::stdlib;
use fastats::{Engine, EngineConfig, Module, Value};

const CHAIN: &str = "
fn square(x) { x * x }
fn cube(x) { square(x) * x }
fn quad(x) { cube(x) * x }
fn quint(x) { quad(x) * x }

@fs
fn parent(a) {
    let b = a + 1
    quint(b)
}

fn double(x) { x + x }
fn mean(x) { array.sum(x) / len(x) }
";

fn engine(cache: bool) -> Arc<Engine> {
    Engine::new(EngineConfig {
        cache,
        ..EngineConfig::default()
    })
}

/// Benchmark: one full specialization pass over a four-deep chain.
fn bench_full_pass(c: &mut Criterion) {
    let module = Module::load(&engine(false), "chain", CHAIN).unwrap();
    let parent = module.gateway("parent").unwrap();
    let double = module.callable("double").unwrap();

    let mut group = c.benchmark_group("specialize");
    group.bench_function("uncached_chain", |b| {
        b.iter(|| {
            parent
                .invoke()
                .with("square", double.clone())
                .compile()
                .unwrap()
        })
    });
    group.finish();
}

/// Benchmark: gateway call served from the cache.
fn bench_cached_call(c: &mut Criterion) {
    let module = Module::load(&engine(true), "chain", CHAIN).unwrap();
    let parent = module.gateway("parent").unwrap();
    let double = module.callable("double").unwrap();

    let mut group = c.benchmark_group("specialize");
    group.bench_function("cached_chain_call", |b| {
        b.iter(|| {
            parent
                .invoke()
                .arg(black_box(2.0))
                .with("square", double.clone())
                .run()
                .unwrap()
        })
    });
    group.finish();
}

/// Benchmark: rolling mean over 10k points, interpreted vs compiled.
fn bench_windowed_pass(c: &mut Criterion) {
    let engine = engine(true);
    let core = stdlib::core(&engine).unwrap();
    let module = Module::load(&engine, "chain", CHAIN).unwrap();
    let pass = core.windowed_pass().unwrap();
    let data = Value::from((0..10_000).map(|i| (i as f64).sqrt()).collect::<Vec<_>>());
    let win = Value::Num(20.0);

    let compiled = pass
        .invoke()
        .with("value", module.callable("mean").unwrap())
        .compile()
        .unwrap();
    let plain = module.function("mean").unwrap();
    let mut group = c.benchmark_group("windowed_pass");
    group.sample_size(20);
    group.bench_function("compiled_mean", |b| {
        b.iter(|| compiled.call(black_box(&[data.clone(), win.clone()])).unwrap())
    });
    group.bench_function("interpreted_default", |b| {
        b.iter(|| pass.call_plain(black_box(&[data.clone(), win.clone()])).unwrap())
    });
    group.bench_function("interpreted_mean_alone", |b| {
        let window = Value::from(vec![1.0; 20]);
        b.iter(|| plain.call(black_box(&[window.clone()])).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_full_pass, bench_cached_call, bench_windowed_pass);
criterion_main!(benches);
