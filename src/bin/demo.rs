//! AtlasPipe Demo Binary
//!
//! Saves and hydrates records over a set of in-memory shards and reports
//! how many round trips each shard served.

use std::sync::Arc;
use std::time::{Duration, Instant};

use atlaspipe::cluster::Cluster;
use atlaspipe::memory::MemoryBackend;
use atlaspipe::model::{Keyspace, Record};
use atlaspipe::{Config, Connection, Entity, Pipeline};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasPipe demo
#[derive(Parser, Debug)]
#[command(name = "atlaspipe-demo")]
#[command(about = "Batch record reads and writes across in-memory shards")]
#[command(version)]
struct Args {
    /// Number of shards
    #[arg(short, long, default_value = "4")]
    shards: usize,

    /// Number of records to write and read back
    #[arg(short, long, default_value = "100")]
    records: usize,

    /// Take this shard offline before reading back
    #[arg(short, long)]
    fail_shard: Option<usize>,

    /// Simulated round trip latency in milliseconds
    #[arg(short, long, default_value = "0")]
    latency_ms: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlaspipe=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("AtlasPipe Demo v{}", atlaspipe::VERSION);

    if let Err(e) = run(&args) {
        tracing::error!("Demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> atlaspipe::Result<()> {
    let config = Config::default();

    let shards: Vec<MemoryBackend> = (0..args.shards.max(1))
        .map(|_| {
            let shard = MemoryBackend::with_config(&config);
            shard.set_latency(Duration::from_millis(args.latency_ms));
            shard
        })
        .collect();
    let nodes: Vec<Arc<dyn Connection>> = shards
        .iter()
        .map(|s| Arc::new(s.clone()) as Arc<dyn Connection>)
        .collect();

    let keyspace = Arc::new(Keyspace::clustered("user", Cluster::new(nodes)?).with_fields(["name", "visits"]));

    // Write every record in one pipeline
    let ids: Vec<String> = (0..args.records).map(|i| i.to_string()).collect();
    let mut pipe = Pipeline::with_config(config.clone());
    for id in &ids {
        let record = Record::new(Arc::clone(&keyspace), id.as_str());
        record.set("name", format!("user-{}", id))?;
        record.set("visits", 1)?;
        record.save(&mut pipe, false)?;
    }
    tracing::info!(
        "Queued {} commands on {} connections",
        pipe.pending_commands(),
        pipe.pending_groups()
    );
    pipe.execute()?;
    report(&shards, "write");

    if let Some(index) = args.fail_shard {
        match shards.get(index) {
            Some(shard) => {
                tracing::info!("Taking shard {} ({}) offline", index, shard.id());
                shard.set_offline(true);
            }
            None => tracing::warn!("No shard {}, nothing taken offline", index),
        }
    }

    // Read everything back in one hydration
    let refs: Vec<Record> = ids
        .iter()
        .map(|id| Record::reference(Arc::clone(&keyspace), id.as_str()))
        .collect();
    let entities: Vec<&dyn Entity> = refs.iter().map(|r| r as &dyn Entity).collect();

    let started = Instant::now();
    let outcome = Pipeline::with_config(config).hydrate(&entities, false);
    let elapsed = started.elapsed();

    let loaded = refs.iter().filter(|r| r.exists()).count();
    tracing::info!("Hydrated {}/{} records in {:?}", loaded, refs.len(), elapsed);
    report(&shards, "total");

    outcome.map(|_| ())
}

fn report(shards: &[MemoryBackend], phase: &str) {
    for (index, shard) in shards.iter().enumerate() {
        tracing::info!(
            "[{}] shard {} ({}): {} keys, {} round trips",
            phase,
            index,
            shard.id(),
            shard.key_count(),
            shard.round_trips()
        );
    }
}
