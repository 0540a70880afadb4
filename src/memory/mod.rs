//! Memory Module
//!
//! An in-process backend connection with pipelined batches.
//!
//! ## Responsibilities
//! - Stand in for a remote key-value server (tests, demos, benchmarks)
//! - One write-lock acquisition per round trip
//! - Count round trips so batching can be observed
//! - Failure and latency injection
//!
//! ## Scripts
//! EVAL looks scripts up by their text. A script is a Rust closure that
//! runs against the store through [`ScriptContext::call`], inside the
//! same round trip as the rest of its batch.

mod batch;
mod store;

pub use batch::MemoryBatch;
pub use store::{Entry, Store};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;

use crate::backend::{BatchHandle, Connection, ConnectionId};
use crate::config::Config;
use crate::error::{PipeError, Result};
use crate::protocol::{Command, Value};

/// A registered script body
pub type Script = Arc<dyn Fn(&mut ScriptContext<'_>, &[Bytes], &[Bytes]) -> Result<Value> + Send + Sync>;

/// What a running script can see
pub struct ScriptContext<'a> {
    store: &'a mut Store,
}

impl ScriptContext<'_> {
    /// Run a command against the store
    pub fn call(&mut self, command: Command) -> Result<Value> {
        self.store.apply(&command)
    }
}

/// In-process backend connection
///
/// Clones share the same store and identity.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    id: ConnectionId,
    raise_on_error: bool,
    store: RwLock<Store>,
    scripts: RwLock<HashMap<String, Script>>,
    round_trips: AtomicU64,
    offline: AtomicBool,
    latency_us: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                id: ConnectionId::next(),
                raise_on_error: config.raise_on_error,
                store: RwLock::new(Store::new()),
                scripts: RwLock::new(HashMap::new()),
                round_trips: AtomicU64::new(0),
                offline: AtomicBool::new(false),
                latency_us: AtomicU64::new(0),
            }),
        }
    }

    /// Register a script under its text
    pub fn register_script<F>(&self, script: impl Into<String>, body: F)
    where
        F: Fn(&mut ScriptContext<'_>, &[Bytes], &[Bytes]) -> Result<Value> + Send + Sync + 'static,
    {
        self.inner.scripts.write().insert(script.into(), Arc::new(body));
    }

    /// Run a single command as its own round trip
    pub fn call(&self, command: Command) -> Result<Value> {
        let mut results = self.inner.round_trip(&[command])?;
        results.pop().ok_or(PipeError::ResultCountMismatch { expected: 1, actual: 0 })
    }

    /// Number of round trips served so far
    pub fn round_trips(&self) -> u64 {
        self.inner.round_trips.load(Ordering::SeqCst)
    }

    /// While offline, every round trip fails before touching the store
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay added to every round trip
    pub fn set_latency(&self, latency: Duration) {
        self.inner
            .latency_us
            .store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.inner.store.read().len()
    }

    /// Copy of the entry under `key`
    pub fn entry(&self, key: &[u8]) -> Option<Entry> {
        self.inner.store.read().entry(key).cloned()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MemoryBackend {
    fn id(&self) -> ConnectionId {
        self.inner.id
    }

    fn pipeline(&self) -> Box<dyn BatchHandle> {
        Box::new(MemoryBatch::new(Arc::clone(&self.inner)))
    }
}

impl Inner {
    /// Apply a whole batch under one write lock
    fn round_trip(&self, commands: &[Command]) -> Result<Vec<Value>> {
        let latency = self.latency_us.load(Ordering::SeqCst);
        if latency > 0 {
            std::thread::sleep(Duration::from_micros(latency));
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(PipeError::Backend(format!("{} is offline", self.id)));
        }
        self.round_trips.fetch_add(1, Ordering::SeqCst);

        let scripts = self.scripts.read();
        let mut store = self.store.write();

        let mut results = Vec::with_capacity(commands.len());
        let mut first_error: Option<(usize, PipeError)> = None;

        for (index, command) in commands.iter().enumerate() {
            let outcome = match command {
                Command::Eval { script, keys, args } => match scripts.get(script) {
                    Some(body) => {
                        let mut context = ScriptContext { store: &mut *store };
                        (body.as_ref())(&mut context, keys.as_slice(), args.as_slice())
                    }
                    None => Err(PipeError::UnknownScript),
                },
                other => store.apply(other),
            };

            match outcome {
                Ok(value) => results.push(value),
                Err(e) => {
                    tracing::trace!("Command #{} failed on {}: {}", index, self.id, e);
                    results.push(Value::Error(e.to_string()));
                    if first_error.is_none() {
                        first_error = Some((index, e));
                    }
                }
            }
        }

        match first_error {
            Some((index, e)) if self.raise_on_error => Err(PipeError::CommandFailed {
                index,
                message: e.to_string(),
            }),
            _ => Ok(results),
        }
    }
}
