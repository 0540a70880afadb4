//! Backend Module
//!
//! The contracts the pipeline needs from the outside world.
//!
//! ## Collaborators
//! - [`Connection`]: a distinct backend connection or shard. Hands out
//!   fresh batches and a comparable [`ConnectionId`].
//! - [`BatchHandle`]: accumulates commands in memory; `execute` performs
//!   exactly one round trip and returns one result per queued command.
//! - [`Entity`]: anything that lives under a storage key on a connection
//!   and knows how to load itself from a raw result.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{Command, Value};

/// Identity of a backend connection; the partition key for batching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate a process-unique identity
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ConnectionId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an identity chosen by the caller
    pub fn from_raw(raw: u64) -> Self {
        ConnectionId(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

/// Receives the raw result of one queued command
pub type Callback = Box<dyn FnOnce(Value) -> Result<()> + Send>;

/// A batch of commands bound to one connection
pub trait BatchHandle: Send {
    /// Queue a command without executing it
    fn queue(&mut self, command: Command) -> Result<()>;

    /// Number of queued commands
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every queued command in one round trip
    ///
    /// Results match queue order. Callable at most once.
    fn execute(&mut self) -> Result<Vec<Value>>;
}

/// A backend connection
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// A fresh, empty batch bound to this connection
    fn pipeline(&self) -> Box<dyn BatchHandle>;
}

/// Something stored under a key on some connection
pub trait Entity {
    /// Stable for the lifetime of use in one pipeline
    fn connection(&self) -> ConnectionId;

    /// A fresh batch bound to `connection()`
    fn new_batch(&self) -> Box<dyn BatchHandle>;

    /// Queue a read on `batch`, returning the callback that populates
    /// this entity from the eventual raw result
    fn prepare_load(&self, batch: &mut dyn BatchHandle) -> Result<Callback>;

    /// Backend key for a primary key
    fn storage_key(&self, primary_key: &str) -> Bytes;

    fn primary_key(&self) -> String;

    fn initialized(&self) -> bool;
}
