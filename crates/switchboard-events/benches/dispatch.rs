//! Event dispatch benchmarks
//!
//! Run with: cargo bench --package switchboard-events

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use switchboard_events::{EventBus, Pattern, Payload, SubscribeOptions};

fn bench_pattern_match(c: &mut Criterion) {
    let exact = Pattern::new("module.loaded");
    let glob = Pattern::new("module.*.done");

    c.bench_function("pattern_exact", |b| {
        b.iter(|| exact.matches(black_box("module.loaded")))
    });

    c.bench_function("pattern_glob", |b| {
        b.iter(|| glob.matches(black_box("module.system_info.done")))
    });
}

fn bench_publish(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("publish");
    for handlers in [1usize, 10, 100] {
        let bus = EventBus::new();
        for i in 0..handlers {
            let pattern = if i % 2 == 0 { "bench.*" } else { "bench.event" };
            bus.subscribe_with(pattern, SubscribeOptions::priority(i as i32 % 7), |_| async {
                Ok(())
            });
        }

        group.bench_with_input(BenchmarkId::from_parameter(handlers), &bus, |b, bus| {
            b.iter(|| runtime.block_on(bus.publish("bench.event", Payload::new())))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pattern_match, bench_publish);
criterion_main!(benches);
