//! Tests for Pipeline
//!
//! These tests verify:
//! - One round trip per distinct connection
//! - Hydration idempotence and the no-round-trip short circuit
//! - Callback delivery in queue order
//! - Failure isolation across connections and first-failure selection
//! - Argument rewriting in generic dispatch

use std::sync::Arc;
use std::time::Duration;

use atlaspipe::memory::MemoryBackend;
use atlaspipe::model::{KeyRef, Keyspace, Record};
use atlaspipe::{
    Arg, BatchHandle, Callback, Command, Config, Connection, ConnectionId, Entity, Kwargs, PipeError,
    Pipeline, Value,
};
use bytes::Bytes;
use parking_lot::Mutex;

// =============================================================================
// Helper Functions
// =============================================================================

fn keyspace_on(name: &str, backend: &MemoryBackend) -> Arc<Keyspace> {
    Arc::new(Keyspace::new(name, Arc::new(backend.clone())))
}

/// Store records whose field "a" equals their primary key
fn seed(keyspace: &Arc<Keyspace>, ids: &[&str]) {
    let mut pipe = Pipeline::new();
    for id in ids {
        let record = Record::new(Arc::clone(keyspace), *id);
        record.set("a", *id).unwrap();
        record.save(&mut pipe, false).unwrap();
    }
    pipe.execute().unwrap();
}

fn references(keyspace: &Arc<Keyspace>, ids: &[&str]) -> Vec<Record> {
    ids.iter()
        .map(|id| Record::reference(Arc::clone(keyspace), *id))
        .collect()
}

fn as_entities(records: &[Record]) -> Vec<&dyn Entity> {
    records.iter().map(|r| r as &dyn Entity).collect()
}

/// Connection that records queued commands and answers each with its index
#[derive(Clone)]
struct RecordingConnection {
    id: ConnectionId,
    log: Arc<Mutex<Vec<Command>>>,
}

impl RecordingConnection {
    fn new() -> Self {
        Self {
            id: ConnectionId::next(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

struct RecordingBatch {
    log: Arc<Mutex<Vec<Command>>>,
    queued: usize,
}

impl BatchHandle for RecordingBatch {
    fn queue(&mut self, command: Command) -> atlaspipe::Result<()> {
        self.log.lock().push(command);
        self.queued += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.queued
    }

    fn execute(&mut self) -> atlaspipe::Result<Vec<Value>> {
        Ok((0..self.queued).map(|i| Value::Int(i as i64)).collect())
    }
}

impl Connection for RecordingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn pipeline(&self) -> Box<dyn BatchHandle> {
        Box::new(RecordingBatch {
            log: Arc::clone(&self.log),
            queued: 0,
        })
    }
}

/// Entity whose load queues a command and then fails
struct BrokenEntity {
    backend: MemoryBackend,
}

impl Entity for BrokenEntity {
    fn connection(&self) -> ConnectionId {
        self.backend.id()
    }

    fn new_batch(&self) -> Box<dyn BatchHandle> {
        self.backend.pipeline()
    }

    fn prepare_load(&self, batch: &mut dyn BatchHandle) -> atlaspipe::Result<Callback> {
        batch.queue(Command::Ping)?;
        Err(PipeError::Conversion("broken".to_string()))
    }

    fn storage_key(&self, primary_key: &str) -> Bytes {
        Bytes::from(format!("broken{{{}}}", primary_key))
    }

    fn primary_key(&self) -> String {
        "x".to_string()
    }

    fn initialized(&self) -> bool {
        false
    }
}

// =============================================================================
// Partitioning Tests
// =============================================================================

#[test]
fn test_hydrate_one_round_trip_per_connection() {
    let conn1 = MemoryBackend::new();
    let conn2 = MemoryBackend::new();
    let foo = keyspace_on("foo", &conn1);
    let bazz = keyspace_on("bazz", &conn1);
    let quux = keyspace_on("quux", &conn2);

    seed(&foo, &["1", "2", "3"]);
    seed(&bazz, &["1", "2"]);
    seed(&quux, &["1", "2", "3", "4"]);

    let before = (conn1.round_trips(), conn2.round_trips());

    let mut records = references(&foo, &["1", "2", "3"]);
    records.extend(references(&bazz, &["1", "2"]));
    records.extend(references(&quux, &["1", "2", "3", "4"]));

    let hydrated = Pipeline::new().hydrate(&as_entities(&records), false).unwrap();

    assert!(hydrated);
    assert_eq!(conn1.round_trips(), before.0 + 1);
    assert_eq!(conn2.round_trips(), before.1 + 1);
    for record in &records {
        assert!(record.exists());
        assert_eq!(record.get_str("a").unwrap().as_deref(), Some(record.primary_key().as_str()));
    }
}

#[test]
fn test_registry_groups_by_connection() {
    let conn1 = MemoryBackend::new();
    let conn2 = MemoryBackend::new();
    let a = keyspace_on("a", &conn1);
    let b = keyspace_on("b", &conn2);

    let records = vec![
        Record::reference(Arc::clone(&a), "1"),
        Record::reference(Arc::clone(&b), "1"),
        Record::reference(Arc::clone(&a), "2"),
    ];

    let mut pipe = Pipeline::new();
    for record in &records {
        assert!(pipe.attach(record, false).unwrap());
    }

    assert_eq!(pipe.pending_groups(), 2);
    assert_eq!(pipe.pending_commands(), 3);
}

#[test]
fn test_execute_drains_the_registry() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let key = KeyRef::new(Arc::clone(&ks), "k");

    let mut pipe = Pipeline::new();
    pipe.set(&key, "v").unwrap();
    pipe.execute().unwrap();
    assert!(pipe.is_empty());
    assert_eq!(conn.round_trips(), 1);

    // Nothing pending, nothing sent
    pipe.execute().unwrap();
    assert_eq!(conn.round_trips(), 1);

    // The pipeline can be reused
    let response = pipe.get(&key).unwrap();
    pipe.execute().unwrap();
    assert_eq!(response.data(), Some(&Value::from("v")));
}

// =============================================================================
// Hydration Guard Tests
// =============================================================================

#[test]
fn test_attach_initialized_entity_queues_nothing() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let record = Record::new(Arc::clone(&ks), "1");

    let mut pipe = Pipeline::new();
    assert!(!pipe.attach(&record, false).unwrap());
    assert!(!pipe.attach(&record, false).unwrap());
    assert_eq!(pipe.pending_commands(), 0);

    pipe.execute().unwrap();
    assert_eq!(conn.round_trips(), 0);
}

#[test]
fn test_attach_force_reloads_initialized_entity() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    seed(&ks, &["1"]);

    let record = Record::get_one(&ks, "1").unwrap().unwrap();
    record.set("a", "local").unwrap();

    let mut pipe = Pipeline::new();
    assert!(pipe.attach(&record, true).unwrap());
    pipe.execute().unwrap();

    assert_eq!(record.get_str("a").unwrap().as_deref(), Some("1"));
}

#[test]
fn test_hydrate_empty_issues_no_round_trip() {
    let conn = MemoryBackend::new();

    let hydrated = Pipeline::new().hydrate(&[], false).unwrap();

    assert!(!hydrated);
    assert_eq!(conn.round_trips(), 0);
}

#[test]
fn test_hydrate_initialized_issues_no_round_trip() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let record = Record::new(Arc::clone(&ks), "1");

    let hydrated = Pipeline::new().hydrate_one(&record, false).unwrap();

    assert!(!hydrated);
    assert_eq!(conn.round_trips(), 0);
}

#[test]
fn test_hydrate_attaches_every_entity() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    seed(&ks, &["2", "3"]);

    // First entity needs nothing; the rest still get attached
    let records = vec![
        Record::new(Arc::clone(&ks), "1"),
        Record::reference(Arc::clone(&ks), "2"),
        Record::reference(Arc::clone(&ks), "3"),
    ];

    assert!(Pipeline::new().hydrate(&as_entities(&records), false).unwrap());
    assert!(records[1].exists());
    assert!(records[2].exists());
}

#[test]
fn test_hydrate_executes_previously_dispatched_commands() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let counter = KeyRef::new(Arc::clone(&ks), "hits");
    seed(&ks, &["1"]);
    let record = Record::reference(Arc::clone(&ks), "1");

    let mut pipe = Pipeline::new();
    let hits = pipe.incr(&counter).unwrap();
    pipe.hydrate_one(&record, false).unwrap();

    assert_eq!(hits.data(), Some(&Value::Int(1)));
    assert!(record.exists());
    assert_eq!(conn.round_trips(), 2); // seed + hydrate
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_callbacks_receive_results_in_queue_order() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let key = KeyRef::new(Arc::clone(&ks), "counter");

    let mut pipe = Pipeline::new();
    let first = pipe.incr(&key).unwrap();
    let second = pipe.incr(&key).unwrap();
    let third = pipe.get(&key).unwrap();

    assert!(!first.is_settled());
    assert_eq!(first.data(), None);

    pipe.execute().unwrap();

    assert_eq!(first.data(), Some(&Value::Int(1)));
    assert_eq!(second.data(), Some(&Value::Int(2)));
    assert_eq!(third.data(), Some(&Value::from("2")));
}

#[test]
fn test_write_then_read_in_one_round_trip() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("TT_foo", &conn);
    let record = Record::reference(Arc::clone(&ks), "1");

    let mut pipe = Pipeline::new();
    let write = pipe.hset(&record, "foo", "now").unwrap();
    let read = pipe.hget(&record, "foo").unwrap();

    assert_eq!(write.key(), "1");
    assert_eq!(read.key(), "1");

    pipe.execute().unwrap();

    assert_eq!(write.data(), Some(&Value::Int(1)));
    assert_eq!(read.data(), Some(&Value::from("now")));
    assert_eq!(conn.round_trips(), 1);
}

#[test]
fn test_results_stay_with_their_connection() {
    let conn1 = MemoryBackend::new();
    let conn2 = MemoryBackend::new();
    // conn1 finishes last
    conn1.set_latency(Duration::from_millis(30));

    let ks1 = keyspace_on("shared", &conn1);
    let ks2 = keyspace_on("shared", &conn2);

    let mut pipe = Pipeline::new();
    pipe.hset(&Record::reference(Arc::clone(&ks1), "x"), "a", "from-conn1").unwrap();
    pipe.hset(&Record::reference(Arc::clone(&ks2), "x"), "a", "from-conn2").unwrap();
    pipe.execute().unwrap();

    let a = Record::reference(Arc::clone(&ks1), "x");
    let b = Record::reference(Arc::clone(&ks2), "x");
    Pipeline::new().hydrate(&[&a, &b], false).unwrap();

    assert_eq!(a.get_str("a").unwrap().as_deref(), Some("from-conn1"));
    assert_eq!(b.get_str("a").unwrap().as_deref(), Some("from-conn2"));
}

// =============================================================================
// Scheduling Tests
// =============================================================================

fn record_thread_name(names: &Arc<Mutex<Vec<String>>>) -> Callback {
    let names = Arc::clone(names);
    Box::new(move |_: Value| {
        let name = std::thread::current().name().unwrap_or("").to_string();
        names.lock().push(name);
        Ok(())
    })
}

#[test]
fn test_single_connection_runs_inline() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let key = KeyRef::new(Arc::clone(&ks), "k");
    let names = Arc::new(Mutex::new(Vec::new()));

    let mut pipe = Pipeline::new();
    pipe.queue(&key, Command::Ping, record_thread_name(&names)).unwrap();
    pipe.execute().unwrap();

    let names = names.lock();
    assert_eq!(names.len(), 1);
    assert!(!names[0].starts_with("atlaspipe-exec"));
}

#[test]
fn test_multiple_connections_run_on_workers() {
    let conn1 = MemoryBackend::new();
    let conn2 = MemoryBackend::new();
    let k1 = KeyRef::new(keyspace_on("t", &conn1), "k");
    let k2 = KeyRef::new(keyspace_on("t", &conn2), "k");
    let names = Arc::new(Mutex::new(Vec::new()));

    let mut pipe = Pipeline::with_config(Config::builder().worker_name_prefix("pool").build());
    pipe.queue(&k1, Command::Ping, record_thread_name(&names)).unwrap();
    pipe.queue(&k2, Command::Ping, record_thread_name(&names)).unwrap();
    pipe.execute().unwrap();

    let mut names = names.lock().clone();
    names.sort();
    assert_eq!(names, vec!["pool-0".to_string(), "pool-1".to_string()]);
}

#[test]
fn test_below_parallel_threshold_runs_inline() {
    let conn1 = MemoryBackend::new();
    let conn2 = MemoryBackend::new();
    let k1 = KeyRef::new(keyspace_on("t", &conn1), "k");
    let k2 = KeyRef::new(keyspace_on("t", &conn2), "k");
    let names = Arc::new(Mutex::new(Vec::new()));

    let config = Config::builder().parallel_threshold(3).worker_name_prefix("pool").build();
    let mut pipe = Pipeline::with_config(config);
    pipe.queue(&k1, Command::Ping, record_thread_name(&names)).unwrap();
    pipe.queue(&k2, Command::Ping, record_thread_name(&names)).unwrap();
    pipe.execute().unwrap();

    let names = names.lock();
    assert_eq!(names.len(), 2);
    assert!(names.iter().all(|n| !n.starts_with("pool")));
}

#[test]
fn test_raised_parallel_threshold_fans_out_once_reached() {
    let conns: Vec<MemoryBackend> = (0..3).map(|_| MemoryBackend::new()).collect();
    let keys: Vec<KeyRef> = conns
        .iter()
        .map(|c| KeyRef::new(keyspace_on("t", c), "k"))
        .collect();
    let names = Arc::new(Mutex::new(Vec::new()));

    let config = Config::builder().parallel_threshold(3).worker_name_prefix("pool").build();
    let mut pipe = Pipeline::with_config(config);
    for key in &keys {
        pipe.queue(key, Command::Ping, record_thread_name(&names)).unwrap();
    }
    pipe.execute().unwrap();

    let mut names = names.lock().clone();
    names.sort();
    assert_eq!(names, vec!["pool-0".to_string(), "pool-1".to_string(), "pool-2".to_string()]);
}

#[test]
fn test_parallel_threshold_never_below_two() {
    assert_eq!(Config::builder().parallel_threshold(0).build().parallel_threshold, 2);
    assert_eq!(Config::builder().parallel_threshold(5).build().parallel_threshold, 5);
}

// =============================================================================
// Failure Tests
// =============================================================================

#[test]
fn test_failed_connection_does_not_block_others() {
    let healthy = MemoryBackend::new();
    let broken = MemoryBackend::new();
    let foo = keyspace_on("foo", &healthy);
    let err = keyspace_on("err", &broken);
    seed(&foo, &["1", "2", "3"]);
    seed(&err, &["1", "2", "3"]);
    broken.set_offline(true);

    let foo_records = references(&foo, &["1", "2", "3"]);
    let err_records = references(&err, &["1", "2", "3"]);
    let mut all = as_entities(&foo_records);
    all.extend(as_entities(&err_records));

    let result = Pipeline::new().hydrate(&all, false);

    let error = result.unwrap_err();
    assert_eq!(error.connection(), Some(broken.id()));
    assert!(matches!(error.root(), PipeError::Backend(_)));
    for record in &foo_records {
        assert_eq!(record.get_str("a").unwrap().as_deref(), Some(record.primary_key().as_str()));
    }
    for record in &err_records {
        assert!(!record.exists());
        assert_eq!(record.get_raw("a"), None);
    }
}

#[test]
fn test_first_failure_follows_registration_order() {
    let first = MemoryBackend::new();
    let second = MemoryBackend::new();
    let third = MemoryBackend::new();
    // The first registered group fails slowest
    first.set_offline(true);
    first.set_latency(Duration::from_millis(30));
    third.set_offline(true);

    let k1 = KeyRef::new(keyspace_on("t", &first), "k");
    let k2 = KeyRef::new(keyspace_on("t", &second), "k");
    let k3 = KeyRef::new(keyspace_on("t", &third), "k");

    let mut pipe = Pipeline::new();
    pipe.set(&k1, "1").unwrap();
    let ok = pipe.set(&k2, "2").unwrap();
    pipe.set(&k3, "3").unwrap();

    let error = pipe.execute().unwrap_err();

    assert_eq!(error.connection(), Some(first.id()));
    assert_eq!(ok.data(), Some(&Value::ok()));
}

#[test]
fn test_single_group_failure_has_partial_delivery() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let key = KeyRef::new(Arc::clone(&ks), "k");

    let mut pipe = Pipeline::new();
    let before = pipe.set(&key, "v").unwrap();
    pipe.queue(&key, Command::Ping, Box::new(|_: Value| Err(PipeError::Conversion("bad".to_string()))))
        .unwrap();
    let after = pipe.get(&key).unwrap();

    let error = pipe.execute().unwrap_err();

    assert_eq!(error.connection(), Some(conn.id()));
    assert!(matches!(error.root(), PipeError::Conversion(_)));
    assert_eq!(before.data(), Some(&Value::ok()));
    assert!(!after.is_settled());
}

#[test]
fn test_failing_command_fails_the_round_trip() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let key = KeyRef::new(Arc::clone(&ks), "k");

    let mut pipe = Pipeline::new();
    pipe.set(&key, "text").unwrap();
    let hits = pipe.hincrby(&key, "f", 1).unwrap();

    let error = pipe.execute().unwrap_err();

    assert!(matches!(error.root(), PipeError::CommandFailed { index: 1, .. }));
    assert!(!hits.is_settled());
}

#[test]
fn test_failing_command_delivered_when_not_raising() {
    let config = Config::builder().raise_on_error(false).build();
    let conn = MemoryBackend::with_config(&config);
    let ks = keyspace_on("t", &conn);
    let key = KeyRef::new(Arc::clone(&ks), "k");

    let mut pipe = Pipeline::with_config(config);
    let set = pipe.set(&key, "text").unwrap();
    let hits = pipe.hincrby(&key, "f", 1).unwrap();
    pipe.execute().unwrap();

    assert_eq!(set.data(), Some(&Value::ok()));
    assert!(matches!(hits.data(), Some(Value::Error(_))));
}

#[test]
fn test_worker_panic_is_reported_and_isolated() {
    let conn1 = MemoryBackend::new();
    let conn2 = MemoryBackend::new();
    let k1 = KeyRef::new(keyspace_on("t", &conn1), "k");
    let k2 = KeyRef::new(keyspace_on("t", &conn2), "k");

    let mut pipe = Pipeline::new();
    pipe.queue(&k1, Command::Ping, Box::new(|_: Value| -> atlaspipe::Result<()> { panic!("callback blew up") })).unwrap();
    let ok = pipe.set(&k2, "v").unwrap();

    let error = pipe.execute().unwrap_err();

    assert!(matches!(error, PipeError::WorkerPanicked { connection } if connection == conn1.id()));
    assert_eq!(ok.data(), Some(&Value::ok()));
}

#[test]
fn test_failed_load_keeps_callbacks_aligned() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("t", &conn);
    let key = KeyRef::new(Arc::clone(&ks), "k");
    let broken = BrokenEntity { backend: conn.clone() };

    let mut pipe = Pipeline::new();
    assert!(pipe.attach(&broken, false).is_err());
    let set = pipe.set(&key, "v").unwrap();
    pipe.execute().unwrap();

    // The orphaned PING reply must not land in the SET placeholder
    assert_eq!(set.data(), Some(&Value::ok()));
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[test]
fn test_dispatch_rewrites_argument_zero() {
    let conn = RecordingConnection::new();
    let ks = Arc::new(Keyspace::new("user", Arc::new(conn.clone())));
    let entity = Record::reference(Arc::clone(&ks), "x");

    let mut pipe = Pipeline::new();
    let response = pipe.dispatch("get", vec![Arg::Entity(&entity)], Kwargs::new()).unwrap();
    pipe.execute().unwrap();

    assert_eq!(
        conn.log.lock().clone(),
        vec![Command::Get {
            key: Bytes::from_static(b"user{x}")
        }]
    );
    assert_eq!(response.key(), "x");
    assert_eq!(response.data(), Some(&Value::Int(0)));
}

#[test]
fn test_dispatch_eval_rewrites_argument_two() {
    let conn = RecordingConnection::new();
    let ks = Arc::new(Keyspace::new("user", Arc::new(conn.clone())));
    let entity = Record::reference(Arc::clone(&ks), "x");

    let mut pipe = Pipeline::new();
    pipe.dispatch(
        "eval",
        vec![Arg::value("return 1"), Arg::value(1), Arg::Entity(&entity), Arg::value("extra")],
        Kwargs::new(),
    )
    .unwrap();

    assert_eq!(
        conn.log.lock().clone(),
        vec![Command::Eval {
            script: "return 1".to_string(),
            keys: vec![Bytes::from_static(b"user{x}")],
            args: vec![Bytes::from_static(b"extra")],
        }]
    );
}

#[test]
fn test_dispatch_forwards_keyword_arguments() {
    let conn = MemoryBackend::new();
    let ks = keyspace_on("board", &conn);
    let board = KeyRef::new(Arc::clone(&ks), "1");

    let mut pipe = Pipeline::new();
    pipe.zadd(&board, 1.5, "a").unwrap();
    let plain = pipe.zrange(&board, 0, -1, false).unwrap();
    let scored = pipe
        .dispatch(
            "ZRANGE",
            vec![Arg::Entity(&board), Arg::value(0), Arg::value(-1)],
            Kwargs::new().with("withscores", true as i64),
        )
        .unwrap();
    pipe.execute().unwrap();

    assert_eq!(plain.data(), Some(&Value::Array(vec![Value::from("a")])));
    assert_eq!(
        scored.data(),
        Some(&Value::Array(vec![Value::from("a"), Value::from("1.5")]))
    );
}

#[test]
fn test_dispatch_forwards_unknown_command_verbatim() {
    let conn = RecordingConnection::new();
    let ks = Arc::new(Keyspace::new("t", Arc::new(conn.clone())));
    let key = KeyRef::new(ks, "k");

    let mut pipe = Pipeline::new();
    let response = pipe
        .dispatch(
            "zpopmin",
            vec![Arg::Entity(&key), Arg::value(2)],
            Kwargs::new().with("nowait", 1),
        )
        .unwrap();
    assert_eq!(pipe.pending_commands(), 1);
    pipe.execute().unwrap();

    assert_eq!(
        conn.log.lock().clone(),
        vec![Command::Raw {
            name: "zpopmin".to_string(),
            args: vec![Bytes::from("t{k}"), Bytes::from("2")],
            kwargs: Kwargs::new().with("nowait", 1),
        }]
    );
    assert_eq!(response.data(), Some(&Value::Int(0)));
}

#[test]
fn test_known_command_with_extra_kwargs_is_forwarded() {
    let conn = RecordingConnection::new();
    let ks = Arc::new(Keyspace::new("t", Arc::new(conn.clone())));
    let key = KeyRef::new(ks, "k");

    let mut pipe = Pipeline::new();
    pipe.dispatch(
        "set",
        vec![Arg::Entity(&key), Arg::value("v")],
        Kwargs::new().with("nx", 1),
    )
    .unwrap();
    pipe.execute().unwrap();

    assert!(matches!(
        &conn.log.lock()[0],
        Command::Raw { name, kwargs, .. } if name == "set" && kwargs.get("nx") == Some(&Value::Int(1))
    ));
}

#[test]
fn test_unsupported_command_fails_only_itself() {
    let conn = MemoryBackend::with_config(&Config::builder().raise_on_error(false).build());
    let key = KeyRef::new(keyspace_on("t", &conn), "k");

    let mut pipe = Pipeline::new();
    let before = pipe.set(&key, "v").unwrap();
    let unsupported = pipe
        .dispatch("object", vec![Arg::Entity(&key)], Kwargs::new())
        .unwrap();
    let after = pipe.get(&key).unwrap();
    pipe.execute().unwrap();

    assert_eq!(before.data(), Some(&Value::ok()));
    assert!(matches!(unsupported.data(), Some(Value::Error(_))));
    assert_eq!(after.data(), Some(&Value::from("v")));
}

#[test]
fn test_dispatch_requires_entity_in_acting_position() {
    let conn = MemoryBackend::new();
    let key = KeyRef::new(keyspace_on("t", &conn), "k");

    let mut pipe = Pipeline::new();
    let misplaced = pipe.dispatch("get", vec![Arg::value("raw-key")], Kwargs::new());
    let eval_at_zero = pipe.dispatch(
        "eval",
        vec![Arg::Entity(&key), Arg::value(1), Arg::value("x")],
        Kwargs::new(),
    );

    assert!(matches!(misplaced, Err(PipeError::InvalidArgument(_))));
    assert!(matches!(eval_at_zero, Err(PipeError::InvalidArgument(_))));
    assert_eq!(pipe.pending_commands(), 0);
}

#[test]
fn test_dispatch_rejects_bad_arguments_before_queueing() {
    let conn = MemoryBackend::new();
    let key = KeyRef::new(keyspace_on("t", &conn), "k");

    let mut pipe = Pipeline::new();
    let result = pipe.dispatch(
        "set",
        vec![Arg::Entity(&key)],
        Kwargs::new().with("nx", 1),
    );

    assert!(matches!(result, Err(PipeError::InvalidArgument(_))));
    assert_eq!(pipe.pending_commands(), 0);

    // The group stays consistent for later commands
    let ok = pipe.set(&key, "v").unwrap();
    pipe.execute().unwrap();
    assert_eq!(ok.data(), Some(&Value::ok()));
}

#[test]
fn test_eval_runs_registered_script() {
    let conn = MemoryBackend::new();
    conn.register_script("incr-and-tag", |ctx, keys, args| {
        let key = keys[0].clone();
        let count = ctx.call(Command::IncrBy { key, delta: 1 })?;
        let tag = args.first().cloned().unwrap_or_default();
        Ok(Value::Array(vec![count, Value::Bytes(tag)]))
    });
    let key = KeyRef::new(keyspace_on("t", &conn), "k");

    let mut pipe = Pipeline::new();
    let first = pipe.eval("incr-and-tag", &key, vec![Value::from("a")]).unwrap();
    let second = pipe.eval("incr-and-tag", &key, vec![Value::from("b")]).unwrap();
    pipe.execute().unwrap();

    assert_eq!(
        first.data(),
        Some(&Value::Array(vec![Value::Int(1), Value::from("a")]))
    );
    assert_eq!(
        second.data(),
        Some(&Value::Array(vec![Value::Int(2), Value::from("b")]))
    );
}
