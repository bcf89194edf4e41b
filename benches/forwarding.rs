use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rust_ccnsim::common::ndn::{DataMessage, Name};
use rust_ccnsim::common::types::NodeId;
use rust_ccnsim::engine::config::TopologyConfig;
use rust_ccnsim::engine::cs::ContentStore;
use rust_ccnsim::{SimConfig, Simulation};

fn content_store_churn(c: &mut Criterion) {
    let objects: Vec<DataMessage> = (0..1024)
        .map(|i| {
            DataMessage::new(Name::from_string(&format!("p/f{}/8/{}", i % 64, i % 8)), Bytes::new(), NodeId(0))
                .with_size(1024)
        })
        .collect();

    c.bench_function("cs_insert_evict_1024", |b| {
        b.iter_batched(
            || ContentStore::new(64 * 1024),
            |mut cs| {
                for data in &objects {
                    black_box(cs.insert(data.clone()));
                }
                cs
            },
            BatchSize::SmallInput,
        )
    });
}

fn small_tree_run(c: &mut Criterion) {
    let mut config = SimConfig::default();
    config.topology = TopologyConfig::KaryTree {
        k: 2,
        height: 4,
        prefix: "p".into(),
    };
    config.workload.files_per_prefix = 20;
    config.workload.chunks_per_file = 10;
    config.response_target = 2_000;

    c.bench_function("binary_tree_2000_responses", |b| {
        b.iter_batched(
            || Simulation::new(config.clone()).expect("valid config"),
            |mut sim| black_box(sim.run().expect("run completes")),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, content_store_churn, small_tree_run);
criterion_main!(benches);
