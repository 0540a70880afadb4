//! Model Module
//!
//! Concrete entities the pipeline can batch for.
//!
//! ## Key Layout
//! ```text
//!   keyspace "user", primary key "42"  ──▶  storage key "user{42}"
//! ```
//! The braces make the primary key the hash tag, which keeps a record on
//! one node when its keyspace is clustered.
//!
//! - [`Record`]: a hash of raw field values, loaded with HGETALL (or
//!   HMGET when the keyspace declares its fields)
//! - [`KeyRef`]: any other container, loaded as an existence check
//! - [`StringKey`], [`SetKey`], [`ListKey`], [`SortedSetKey`], [`HashKey`]:
//!   typed containers whose methods queue commands on a pipeline
//! - [`Index`]: a string map sharded over several hashes

mod containers;
mod key_ref;
mod keyspace;
mod record;

pub use containers::{HashKey, Index, ListKey, SetKey, SortedSetKey, StringKey, DEFAULT_SHARD_COUNT};
pub use key_ref::KeyRef;
pub use keyspace::{Keyspace, Route};
pub use record::Record;
