//! Benchmarks for AtlasPipe hydration

use std::sync::Arc;

use atlaspipe::cluster::Cluster;
use atlaspipe::memory::MemoryBackend;
use atlaspipe::model::{Keyspace, Record};
use atlaspipe::{Connection, Entity, Pipeline};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

const RECORDS: usize = 1_000;

fn seeded_keyspace(shards: usize) -> Arc<Keyspace> {
    let nodes: Vec<Arc<dyn Connection>> = (0..shards)
        .map(|_| Arc::new(MemoryBackend::new()) as Arc<dyn Connection>)
        .collect();
    let keyspace = match Cluster::new(nodes) {
        Ok(cluster) => Arc::new(Keyspace::clustered("bench", cluster)),
        Err(e) => panic!("cluster setup failed: {}", e),
    };

    let mut pipe = Pipeline::new();
    for i in 0..RECORDS {
        let record = Record::new(Arc::clone(&keyspace), i.to_string());
        record.set("n", i).unwrap();
        record.save(&mut pipe, false).unwrap();
    }
    pipe.execute().unwrap();
    keyspace
}

fn hydration_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("hydrate");

    for shards in [1usize, 4, 8] {
        let keyspace = seeded_keyspace(shards);
        group.bench_with_input(BenchmarkId::new("shards", shards), &keyspace, |b, keyspace| {
            b.iter(|| {
                let refs: Vec<Record> = (0..RECORDS)
                    .map(|i| Record::reference(Arc::clone(keyspace), i.to_string()))
                    .collect();
                let entities: Vec<&dyn Entity> = refs.iter().map(|r| r as &dyn Entity).collect();
                Pipeline::new().hydrate(&entities, false).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, hydration_benchmarks);
criterion_main!(benches);
