use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use millwright_core::generation::{generate_settlement, NodeCluster, SettlementConfig};
use millwright_core::prelude::*;

fn settlement(scale: u32) -> EconomyEngine {
    let mut engine = EconomyEngine::new();
    let config = SettlementConfig {
        radius: 40.0 * scale as f32,
        gatherers: 4 * scale,
        builders: 2 * scale,
        haulers: 2 * scale,
        crafters: vec![Specialization::Carpenter; scale as usize],
        buildings: (0..scale)
            .flat_map(|_| ["sawmill", "house", "house", "warehouse"])
            .map(String::from)
            .collect(),
        nodes: vec![
            NodeCluster::new("wood", 3 * scale, 200),
            NodeCluster::new("stone", 2 * scale, 200),
            NodeCluster::new("berries", 2 * scale, 200),
        ],
        starting_stock: vec![("wood".into(), 200), ("stone".into(), 100), ("berries".into(), 200)],
        ..Default::default()
    };
    generate_settlement(&mut engine, &config).unwrap();
    // Let everyone pick up work before measuring.
    for _ in 0..20 {
        engine.update(0.25);
    }
    engine
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("economy_tick");
    for scale in [1, 5, 20] {
        group.bench_function(format!("settlement_x{scale}"), |b| {
            b.iter_batched_ref(
                || settlement(scale),
                |engine| engine.update(black_box(0.05)),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_report(c: &mut Criterion) {
    let engine = settlement(5);
    c.bench_function("economy_report", |b| b.iter(|| black_box(engine.report())));
}

criterion_group!(benches, bench_tick, bench_report);
criterion_main!(benches);
