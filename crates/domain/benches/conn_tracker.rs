use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use domain::conntrack::CONN_EXPIRES;
use domain::conntrack::entity::{Flow, FlowKey, ManualClock};
use domain::conntrack::table::ConnTracker;

fn tracker_with_flows(n: u32) -> ConnTracker {
    let tracker = ConnTracker::new(Arc::new(ManualClock::new()));
    for i in 0..n {
        let key = FlowKey::new(0x0A00_0000 | i, 0x0808_0808, (i % 60000) as u16, 443);
        let deadline = tracker.deadline(CONN_EXPIRES);
        tracker.insert(Flow::new(key, 6, false, deadline));
    }
    tracker
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_lookup");

    for &n in &[100u32, 10_000, 100_000] {
        let tracker = tracker_with_flows(n);
        let hit = FlowKey::new(0x0A00_0000 | (n / 2), 0x0808_0808, ((n / 2) % 60000) as u16, 443);
        let miss = FlowKey::new(0xDEAD_BEEF, 0x0808_0808, 1, 443);

        group.bench_with_input(BenchmarkId::new("hit", n), &n, |b, _| {
            b.iter(|| tracker.lookup(black_box(hit)));
        });

        group.bench_with_input(BenchmarkId::new("miss", n), &n, |b, _| {
            b.iter(|| tracker.lookup(black_box(miss)));
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_insert");

    for &n in &[100u32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || tracker_with_flows(n),
                |tracker| {
                    let key = FlowKey::new(0xC0A8_0001, 0x0808_0808, 5555, 443);
                    let deadline = tracker.deadline(CONN_EXPIRES);
                    tracker.insert(Flow::new(key, 6, false, deadline));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lookup, bench_insert);
criterion_main!(benches);
