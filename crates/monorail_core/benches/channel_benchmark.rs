//! # Channel Benchmark
//!
//! Round trips between two logical threads through a pair of channels. Every
//! message costs a suspend on one side and a resume on the other, so this is
//! the price of one handshake plus two region hand-offs.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use monorail_core::{BoundedChannel, Channel, Runtime, StrategyKind};

fn ping_pong(strategy: StrategyKind, iters: u64) -> Duration {
    let runtime = Runtime::with_strategy(strategy);
    let rt = runtime.clone();
    runtime
        .run(move || {
            let ping = Arc::new(Channel::new(&rt));
            let pong = Arc::new(Channel::new(&rt));

            let echo = {
                let ping = Arc::clone(&ping);
                let pong = Arc::clone(&pong);
                rt.spawn(move || {
                    for _ in 0..iters {
                        let v: u64 = ping.receive();
                        pong.send(v + 1);
                    }
                })
            };
            let Ok(echo) = echo else {
                return Duration::ZERO;
            };

            let begin = Instant::now();
            for i in 0..iters {
                ping.send(i);
                let _ = pong.receive();
            }
            let elapsed = begin.elapsed();
            let _ = echo.join();
            elapsed
        })
        .unwrap_or_default()
}

fn bounded_stream(capacity: usize, iters: u64) -> Duration {
    let runtime = Runtime::with_strategy(StrategyKind::Elision);
    let rt = runtime.clone();
    runtime
        .run(move || {
            let channel = Arc::new(BoundedChannel::new(&rt, capacity));
            let producer = {
                let channel = Arc::clone(&channel);
                rt.spawn(move || (0..iters).for_each(|v| channel.send(v)))
            };
            let Ok(producer) = producer else {
                return Duration::ZERO;
            };

            let begin = Instant::now();
            for _ in 0..iters {
                let _ = channel.receive();
            }
            let elapsed = begin.elapsed();
            let _ = producer.join();
            elapsed
        })
        .unwrap_or_default()
}

fn bench_ping_pong(c: &mut Criterion) {
    let mut group = c.benchmark_group("channel_ping_pong");
    for strategy in StrategyKind::ALL {
        group.bench_function(BenchmarkId::from_parameter(strategy), |b| {
            b.iter_custom(|iters| ping_pong(strategy, iters));
        });
    }
    group.finish();
}

fn bench_bounded(c: &mut Criterion) {
    let mut group = c.benchmark_group("bounded_channel_stream");
    for capacity in [1, 16, 256] {
        group.bench_function(BenchmarkId::from_parameter(capacity), |b| {
            b.iter_custom(|iters| bounded_stream(capacity, iters));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ping_pong, bench_bounded);
criterion_main!(benches);
