//! Plain container keys
//!
//! A handle on a string, set, sorted set or list key. Loading only
//! learns whether the key exists; the contents are read with
//! dispatched commands.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use super::Keyspace;
use crate::backend::{BatchHandle, Callback, ConnectionId, Entity};
use crate::error::Result;
use crate::pipeline::{Pipeline, Response};
use crate::protocol::{Command, Value};

/// Reference to a container stored under `keyspace{key}`
#[derive(Clone)]
pub struct KeyRef {
    keyspace: Arc<Keyspace>,
    key: String,

    /// None until loaded
    exists: Arc<RwLock<Option<bool>>>,
}

impl KeyRef {
    pub fn new(keyspace: Arc<Keyspace>, key: impl Into<String>) -> Self {
        Self {
            keyspace,
            key: key.into(),
            exists: Arc::new(RwLock::new(None)),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the key existed at the last load
    pub fn exists(&self) -> Option<bool> {
        *self.exists.read()
    }

    /// Queue an expiry; `None` uses the pipeline's default TTL
    pub fn set_expire(&self, pipe: &mut Pipeline, seconds: Option<u64>) -> Result<Response> {
        let seconds = seconds.unwrap_or(pipe.config().default_expire_secs);
        pipe.expire(self, seconds)
    }

    /// Queue removal of the container
    pub fn clear(&self, pipe: &mut Pipeline) -> Result<Response> {
        pipe.del(self)
    }
}

impl Entity for KeyRef {
    fn connection(&self) -> ConnectionId {
        self.keyspace.connection_for(&self.key).id()
    }

    fn new_batch(&self) -> Box<dyn BatchHandle> {
        self.keyspace.connection_for(&self.key).pipeline()
    }

    fn prepare_load(&self, batch: &mut dyn BatchHandle) -> Result<Callback> {
        batch.queue(Command::Exists {
            key: self.storage_key(&self.key),
        })?;

        let exists = Arc::clone(&self.exists);
        Ok(Box::new(move |raw: Value| {
            *exists.write() = Some(raw.as_int() == Some(1));
            Ok(())
        }))
    }

    fn storage_key(&self, primary_key: &str) -> Bytes {
        self.keyspace.storage_key(primary_key)
    }

    fn primary_key(&self) -> String {
        self.key.clone()
    }

    fn initialized(&self) -> bool {
        self.exists.read().is_some()
    }
}
