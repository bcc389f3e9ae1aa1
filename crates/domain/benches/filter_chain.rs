use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use domain::addr::entity::{Ipv4Net, PortRange};
use domain::common::entity::{Action, PacketMeta, Protocol, RuleName};
use domain::filter::chain::FilterChain;
use domain::filter::entity::FilterRule;

fn make_rule(n: usize) -> FilterRule {
    FilterRule {
        name: RuleName(format!("r{n:04}")),
        src_net: Ipv4Net::from_prefix(0x0A00_0000 | (n as u32 & 0x00FF_FF00), 24),
        dst_net: Ipv4Net::ANY,
        src_ports: PortRange::ANY,
        dst_ports: PortRange::new(80, 80),
        protocol: Protocol::Tcp,
        action: Action::Accept,
        log: false,
    }
}

fn make_meta(matching: bool) -> PacketMeta {
    PacketMeta {
        src_ip: if matching { 0x0A00_0001 } else { 0xC0A8_0001 },
        dst_ip: 0x0A00_0002,
        src_port: 12345,
        dst_port: 80,
        protocol: 6,
    }
}

fn chain_with_rules(n: usize) -> FilterChain {
    let mut chain = FilterChain::new();
    for i in (0..n).rev() {
        chain.add_after("", make_rule(i)).unwrap();
    }
    chain
}

fn bench_match_packet(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_match_packet");

    for &n in &[10, 100, 1_000] {
        let chain = chain_with_rules(n);
        let hit = make_meta(true);
        let miss = make_meta(false);

        group.bench_with_input(BenchmarkId::new("hit", n), &n, |b, _| {
            b.iter(|| chain.match_packet(black_box(&hit)));
        });

        group.bench_with_input(BenchmarkId::new("miss", n), &n, |b, _| {
            b.iter(|| chain.match_packet(black_box(&miss)));
        });
    }

    group.finish();
}

fn bench_add_after(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_add_after");

    for &n in &[10, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || chain_with_rules(n),
                |mut chain| {
                    let _ = chain.add_after("", make_rule(n));
                },
                criterion::BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_match_packet, bench_add_after);
criterion_main!(benches);
