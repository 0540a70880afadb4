//! Response placeholders
//!
//! A single-slot cell for the result of one dispatched command.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::backend::Callback;
use crate::error::PipeError;
use crate::protocol::Value;

/// Deferred result of a dispatched command
///
/// Unset until the pipeline executes; settled exactly once by its own
/// callback. Clones share the same slot.
#[derive(Clone)]
pub struct Response {
    /// Primary key of the entity the command acted on
    key: String,

    slot: Arc<OnceLock<Value>>,
}

impl Response {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            slot: Arc::new(OnceLock::new()),
        }
    }

    /// Primary key of the acting entity
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The settled value, or None before execution
    pub fn data(&self) -> Option<&Value> {
        self.slot.get()
    }

    pub fn is_settled(&self) -> bool {
        self.slot.get().is_some()
    }

    /// Callback that settles this response
    pub(crate) fn settler(&self) -> Callback {
        let slot = Arc::clone(&self.slot);
        Box::new(move |value: Value| slot.set(value).map_err(|_| PipeError::AlreadySettled))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("key", &self.key)
            .field("data", &self.data())
            .finish()
    }
}
