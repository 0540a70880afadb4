//! Batching registry
//!
//! Partitions queued commands by connection identity.

use std::collections::HashMap;

use crate::backend::{BatchHandle, Callback, ConnectionId, Entity};
use crate::error::{PipeError, Result};
use crate::protocol::{Command, Value};

/// One connection's batch plus its ordered callbacks
///
/// The Nth callback belongs to the Nth queued command. Both lists only
/// ever grow by appending, together.
pub struct ConnectionGroup {
    connection: ConnectionId,
    batch: Box<dyn BatchHandle>,
    callbacks: Vec<Callback>,
}

impl ConnectionGroup {
    fn new(connection: ConnectionId, batch: Box<dyn BatchHandle>) -> Self {
        Self {
            connection,
            batch,
            callbacks: Vec::new(),
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Queue a command together with its callback
    pub(crate) fn push(&mut self, command: Command, callback: Callback) -> Result<()> {
        tracing::trace!("Queueing {} on {}", command.name(), self.connection);
        self.batch.queue(command)?;
        self.callbacks.push(callback);
        Ok(())
    }

    /// Let an entity queue its own load command
    ///
    /// The entity must queue exactly one command. Anything it queued
    /// without handing back a usable callback gets a discarding one, so
    /// the pairing with later commands survives.
    pub(crate) fn prepare(&mut self, entity: &dyn Entity) -> Result<()> {
        let before = self.batch.len();
        let prepared = entity.prepare_load(self.batch.as_mut());
        let queued = self.batch.len().saturating_sub(before);

        match prepared {
            Ok(callback) if queued == 1 => {
                self.callbacks.push(callback);
                Ok(())
            }
            Ok(_) => {
                self.pad();
                Err(PipeError::InvalidArgument(format!(
                    "load must queue exactly one command, queued {}",
                    queued
                )))
            }
            Err(e) => {
                self.pad();
                Err(e)
            }
        }
    }

    fn pad(&mut self) {
        while self.callbacks.len() < self.batch.len() {
            self.callbacks.push(Box::new(|_: Value| Ok(())));
        }
    }

    /// Execute the round trip and deliver results in queue order
    ///
    /// Stops at the first failing callback; callbacks after it are
    /// dropped without being invoked. Returns the number delivered.
    pub fn run(self) -> Result<usize> {
        let ConnectionGroup {
            connection,
            mut batch,
            callbacks,
        } = self;

        if callbacks.is_empty() && batch.is_empty() {
            return Ok(0);
        }

        tracing::debug!("Executing {} commands on {}", callbacks.len(), connection);
        let results = batch.execute()?;

        if results.len() != callbacks.len() {
            return Err(PipeError::ResultCountMismatch {
                expected: callbacks.len(),
                actual: results.len(),
            });
        }

        let mut delivered = 0;
        for (callback, result) in callbacks.into_iter().zip(results) {
            callback(result)?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

/// Maps connection identity to its group, in registration order
#[derive(Default)]
pub struct Registry {
    groups: Vec<ConnectionGroup>,
    index: HashMap<ConnectionId, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The entity's group, created on first use
    pub fn obtain_group(&mut self, entity: &dyn Entity) -> &mut ConnectionGroup {
        let connection = entity.connection();
        let slot = match self.index.get(&connection) {
            Some(&slot) => slot,
            None => {
                tracing::trace!("New connection group for {}", connection);
                self.groups.push(ConnectionGroup::new(connection, entity.new_batch()));
                let slot = self.groups.len() - 1;
                self.index.insert(connection, slot);
                slot
            }
        };
        &mut self.groups[slot]
    }

    /// Take every group, leaving the registry empty
    pub fn drain(&mut self) -> Vec<ConnectionGroup> {
        self.index.clear();
        std::mem::take(&mut self.groups)
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Commands queued across all groups
    pub fn pending_commands(&self) -> usize {
        self.groups.iter().map(ConnectionGroup::len).sum()
    }
}
